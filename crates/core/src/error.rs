//! Error types for configuration and engine construction.

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, QcError>;

/// Errors that stop a QC run before any check executes.
#[derive(Debug, thiserror::Error)]
pub enum QcError {
    /// No configuration file was given
    #[error("No configuration file provided.")]
    MissingConfig,

    /// No test dataset was given, or it does not exist
    #[error("No test dataset provided: {0}")]
    MissingInput(String),

    /// Configuration is well-formed YAML but semantically invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
