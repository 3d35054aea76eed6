//! Error types shared across ferry crates

use thiserror::Error;

/// Result type alias for ferry operations
pub type Result<T> = std::result::Result<T, FerryError>;

/// Errors that are not specific to the batch engine
#[derive(Error, Debug)]
pub enum FerryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
