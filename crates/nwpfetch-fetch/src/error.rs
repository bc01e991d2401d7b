//! Error types for nwpfetch-fetch.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a retriever while transferring one resource.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("retrieval task aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Fs(#[from] nwpfetch_fs::Error),
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for RetrieveError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => {
                let url = e.url().map_or_else(|| "<unknown url>".into(), |u| u.to_string());
                RetrieveError::Http(format!("{status} for {url}"))
            }
            None => RetrieveError::Network(e.to_string()),
        }
    }
}

/// Why a single attempt did not commit. Every kind is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("transfer did not finish within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("result too small: {actual} bytes (minimum {minimum})")]
    Integrity { actual: u64, minimum: u64 },

    #[error("local file error: {0}")]
    Io(String),
}

impl From<nwpfetch_fs::Error> for AttemptFailure {
    fn from(e: nwpfetch_fs::Error) -> Self { AttemptFailure::Io(e.to_string()) }
}

impl From<RetrieveError> for AttemptFailure {
    fn from(e: RetrieveError) -> Self { AttemptFailure::Transport(e.to_string()) }
}
