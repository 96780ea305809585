//! Errors at the per-file boundary.

use geoqc_core::QcError;
use geoqc_storage::StorageError;

/// Result alias for orchestration.
pub type Result<T> = std::result::Result<T, QualityError>;

/// Errors that end the QC run of one file.
#[derive(Debug, thiserror::Error)]
pub enum QualityError {
    /// Configuration or input problem found before any check ran
    #[error(transparent)]
    Config(#[from] QcError),

    /// The report could not be read or written
    #[error("Report error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The check sequence panicked outside any single check
    #[error("Check sequence aborted: {0}")]
    Aborted(String),
}
