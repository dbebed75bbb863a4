//! Crate-level error type and `Result` alias.
//! Wraps native engine failures and I/O errors, and provides semantic
//! variants for argument validation and progress-tracking misuse.
use thiserror::Error;

use crate::native::{ImageId, NativeError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Native error: {0}")]
    Native(#[from] NativeError),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: String, value: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("Progress tracking is not enabled for image {image}")]
    NotTracked { image: ImageId },

    #[error("Progress tracking is already enabled for image {image}")]
    AlreadyTracked { image: ImageId },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid<V: std::fmt::Display>(arg: impl Into<String>, value: V) -> Self {
        Error::InvalidArgument {
            arg: arg.into(),
            value: value.to_string(),
        }
    }
}
