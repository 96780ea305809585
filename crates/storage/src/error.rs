//! Storage errors.

use std::path::PathBuf;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while reading or writing reports.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Report or destination not found
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// Other error
    #[error("{0}")]
    Other(String),
}
