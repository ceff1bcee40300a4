//! Protocol error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors on the authenticated channel
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Malformed signature")]
    MalformedSignature,

    #[error("Signature mismatch")]
    BadSignature,

    #[error("Invalid signing key")]
    InvalidKey,

    #[error("Shared secret {path}: {message}")]
    Secret { path: PathBuf, message: String },
}

impl ProtocolError {
    pub fn secret(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Secret {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
