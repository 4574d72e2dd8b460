//! Error types for KnowGraph.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The remote backend could not be reached or answered with a non-success status.
    #[error("Remote unavailable: {}", display_remote(.status, .message))]
    RemoteUnavailable {
        status: Option<u16>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage write failure: {0}")]
    StorageWriteFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn display_remote(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("status {}: {}", code, message),
        None => message.to_string(),
    }
}

impl Error {
    /// Build a `RemoteUnavailable` without an HTTP status (transport failure).
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            status: None,
            message: message.into(),
        }
    }

    /// Build a `RemoteUnavailable` for a non-success HTTP status.
    pub fn remote_status(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
