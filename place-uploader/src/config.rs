#![deny(clippy::perf, clippy::complexity, clippy::style, unused_imports)]
use std::path::PathBuf;

use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use thiserror::Error;
use tracing::Level;

pub(crate) static ENVIROMENT: Env = Env::new();

pub(crate) const DEFAULT_API_URL: &str = "http://localhost:8080/api/place/add";
pub(crate) const DEFAULT_RECORDS_PATH: &str = "./전국관광지정보표준데이터.json";
pub(crate) const DEFAULT_IMAGE_PATH: &str = "next.svg";
pub(crate) const DEFAULT_LOG_LEVEL: Level = Level::INFO;

#[allow(non_snake_case)]
pub(crate) struct Env {
    pub PLACE_API_URL: &'static str,
    pub PLACE_API_TOKEN: &'static str,
    pub PLACE_RECORDS_PATH: &'static str,
    pub PLACE_IMAGE_PATH: &'static str,
    pub PLACE_UPLOADER_LOG: &'static str,
}

impl Env {
    pub(crate) const fn new() -> Self {
        Self {
            PLACE_API_URL: "PLACE_API_URL",
            PLACE_API_TOKEN: "PLACE_API_TOKEN",
            PLACE_RECORDS_PATH: "PLACE_RECORDS_PATH",
            PLACE_IMAGE_PATH: "PLACE_IMAGE_PATH",
            PLACE_UPLOADER_LOG: "PLACE_UPLOADER_LOG",
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("missing env: {0}")]
    Missing(&'static str),
    #[error("bearer token is not a valid header value: {0}")]
    InvalidToken(#[from] InvalidHeaderValue),
    #[error("unknown log level `{0}`")]
    InvalidLogLevel(String),
    #[error("building HTTP client failed: {0}")]
    Client(#[from] reqwest::Error),
}

impl ConfigError {
    pub(crate) fn kind(&self) -> &'static str {
        "ConfigError"
    }
}

pub(crate) struct Config {
    client_http_client: reqwest::Client,
    api_url: String,
    records_path: PathBuf,
    image_path: PathBuf,
    log_level: Level,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name from
    /// [`ENVIROMENT`] to its value.
    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let token = lookup(ENVIROMENT.PLACE_API_TOKEN)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing(ENVIROMENT.PLACE_API_TOKEN))?;
        let log_level = match lookup(ENVIROMENT.PLACE_UPLOADER_LOG) {
            Some(level) => level
                .parse()
                .map_err(|_| ConfigError::InvalidLogLevel(level))?,
            None => DEFAULT_LOG_LEVEL,
        };
        Ok(Self {
            client_http_client: Config::init_place_client(&token)?,
            api_url: lookup(ENVIROMENT.PLACE_API_URL)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            records_path: lookup(ENVIROMENT.PLACE_RECORDS_PATH)
                .unwrap_or_else(|| DEFAULT_RECORDS_PATH.to_string())
                .into(),
            image_path: lookup(ENVIROMENT.PLACE_IMAGE_PATH)
                .unwrap_or_else(|| DEFAULT_IMAGE_PATH.to_string())
                .into(),
            log_level,
        })
    }
    pub fn get_http_client(&self) -> &reqwest::Client {
        &self.client_http_client
    }
    pub fn get_api_url(&self) -> &str {
        &self.api_url
    }
    pub fn get_records_path(&self) -> &PathBuf {
        &self.records_path
    }
    pub fn get_image_path(&self) -> &PathBuf {
        &self.image_path
    }
    pub fn get_log_level(&self) -> Level {
        self.log_level
    }
    /// Every request carries the bearer token; the client has no timeout.
    pub(crate) fn init_place_client(token: &str) -> Result<reqwest::Client, ConfigError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        Ok(reqwest::Client::builder().default_headers(headers).build()?)
    }
}
