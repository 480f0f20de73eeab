//! Error types for the core crate.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Reading or writing a file under the data directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted blob could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
