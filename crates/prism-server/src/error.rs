//! Error responses. Failures are reported as plain text with status 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// No credential was configured when the server started.
    #[error("Missing API Key")]
    MissingCredential,

    /// The hosted model could not be called.
    #[error("{0}")]
    Upstream(&'static str),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
