//! Error types for querylens-core

use thiserror::Error;

/// Main error type for the querylens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed duration or data-size text
    #[error("cannot parse {input:?}: {message}")]
    Parse { input: String, message: String },

    /// Coordinator answered, but not with a snapshot (non-2xx, bad body)
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn parse(input: &str, message: impl Into<String>) -> Self {
        Error::Parse {
            input: input.to_string(),
            message: message.into(),
        }
    }

    /// True for errors the poll loop recovers from by retrying.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Http(_) | Error::Json(_))
    }
}

/// Result type alias for querylens-core
pub type Result<T> = std::result::Result<T, Error>;
