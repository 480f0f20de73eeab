//! Error types for the suggest crate.

use thiserror::Error;

/// Result type alias using the suggest error type.
pub type Result<T> = std::result::Result<T, SuggestError>;

#[derive(Debug, Error)]
pub enum SuggestError {
    /// No credential for a provider that needs one.
    #[error("missing API key: set it in settings or via one of {}", prism_core::CREDENTIAL_ENV_VARS.join(", "))]
    MissingCredential,

    /// Settings name a provider the `llm` crate is not built for.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The hosted model failed or returned nothing usable.
    #[error("model error: {0}")]
    Model(String),

    /// The endpoint could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A response stream broke off after it started.
    #[error("stream error: {0}")]
    Stream(String),

    /// A document generation is already running.
    #[error("a document generation is already in progress")]
    Busy,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
