use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the backend.
///
/// Cloneable so the same failure can be returned to the caller and kept in
/// the observable controller state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned HTTP {status}")]
    Http { status: u16 },

    /// 2xx response whose payload is missing or does not decode.
    #[error("response body was empty or malformed")]
    EmptyBody,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ClientError::Http {
                status: status.as_u16(),
            },
            None => ClientError::Network(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("comment content is empty")]
    EmptyContent,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("base URL {0:?} must start with http:// or https://")]
    InvalidBaseUrl(String),
}
