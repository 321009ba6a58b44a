#![deny(clippy::perf, clippy::complexity, clippy::style, unused_imports)]

use config::{Config, DEFAULT_LOG_LEVEL};
use tracing::{error, info, subscriber::SetGlobalDefaultError, Level};
use tracing_subscriber::FmtSubscriber;
use uploader::upload_places;

use std::{error::Error, process::ExitCode};

mod attachment;
mod config;
mod uploader;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            init_logging(DEFAULT_LOG_LEVEL)?;
            error!("Upload aborted! [{}]: {}", err.kind(), err);
            return Ok(ExitCode::FAILURE);
        }
    };
    init_logging(config.get_log_level())?;

    match upload_places(&config).await {
        Ok(report) => {
            info!(
                "Upload finished!: {} records, {} uploaded, {} failed",
                report.total, report.accepted, report.failed
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!("Upload aborted! [{}]: {}", err.kind(), err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_logging(level: Level) -> Result<(), SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
}
