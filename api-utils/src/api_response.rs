#![deny(clippy::perf, clippy::complexity, clippy::style, unused_imports)]
//! Classification of place API responses into accepted submissions and
//! per-record failures.

use std::error::Error as StdError;
use std::fmt::Display;

use reqwest::{Response, StatusCode};
use thiserror::Error;
use tracing::{debug, trace};

/// A 2xx answer from the place API.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub status: StatusCode,
    pub body: String,
}

/// Why a single record could not be submitted.
///
/// None of these stop a run; the caller logs them and moves on.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The server answered with a non-2xx status.
    #[error("server rejected the request with {status}")]
    Status { status: StatusCode, body: String },
    /// No usable answer: connect, send or body read failed.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Anything else that went wrong while handling the record.
    #[error("{0}")]
    Unknown(#[source] Box<dyn StdError + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Request,
    Unknown,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Request => f.write_str("RequestError"),
            ErrorKind::Unknown => f.write_str("UnknownError"),
        }
    }
}

impl SubmitError {
    pub fn unknown(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        SubmitError::Unknown(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitError::Status { .. } | SubmitError::Transport(_) => ErrorKind::Request,
            SubmitError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Status code of the failed request, when the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SubmitError::Status { status, .. } => Some(*status),
            SubmitError::Transport(err) => err.status(),
            SubmitError::Unknown(_) => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            SubmitError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Reads the whole response and sorts it by status.
///
/// The body is kept on both paths so that rejections can be logged with the
/// server's explanation. A rejection whose body cannot be read is still a
/// [`SubmitError::Status`], with an empty body.
pub async fn check_response(response: Response) -> Result<Accepted, SubmitError> {
    let status = response.status();
    if status.is_success() {
        let body = response.text().await?;
        trace!("Response {}: {} bytes", status, body.len());
        return Ok(Accepted { status, body });
    }
    let body = response.text().await.unwrap_or_else(|err| {
        debug!("Reading body of {} response failed: {}", status, err);
        String::new()
    });
    Err(SubmitError::Status { status, body })
}
