//! Error types for webgrade

use thiserror::Error;

/// Result type alias using the webgrade Error
pub type Result<T> = std::result::Result<T, Error>;

/// webgrade error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid check parameters for '{check}': {reason}")]
    InvalidCheck { check: String, reason: String },

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
