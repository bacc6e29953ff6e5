//! Error → HTTP response mapping.
//!
//! Every failure leaves the gateway as `{"error": ..., "kind": ...}` with a
//! status chosen by the error's kind, so clients can tell "upload a
//! document first" apart from an outage or a failed generation.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paperchat_core::{Error, ErrorKind};
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    /// A resource addressed by the path does not exist.
    NotFound(String),
    /// A request the framework rejected before it reached a handler body.
    Rejected { status: StatusCode, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => status_for(e),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

/// Status for a core error. Timeouts win over the kind.
pub fn status_for(e: &Error) -> StatusCode {
    if e.is_timeout() {
        return StatusCode::GATEWAY_TIMEOUT;
    }
    match e.kind() {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::IndexNotFound => StatusCode::NOT_FOUND,
        ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Generation | ErrorKind::Embedding => StatusCode::BAD_GATEWAY,
        ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Core(e) => {
                if status.is_server_error() {
                    error!(kind = e.kind().as_str(), error = %e, "Request failed");
                }
                ErrorBody {
                    error: e.to_string(),
                    kind: e.kind().as_str(),
                }
            }
            ApiError::NotFound(message) => ErrorBody {
                error: message,
                kind: "not_found",
            },
            ApiError::Rejected { message, .. } => ErrorBody {
                error: message,
                kind: "invalid_input",
            },
        };
        (status, Json(body)).into_response()
    }
}
