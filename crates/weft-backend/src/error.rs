//! Error type for the output backends.

use thiserror::Error;

/// Errors raised while writing an output document or its container.
#[derive(Debug, Error)]
pub enum BackendError {
    /// I/O error from the underlying writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP container error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout `weft-backend`.
pub type Result<T> = std::result::Result<T, BackendError>;
