//! Error types for the HTTP API.
//!
//! [`ApiError`] converts into a JSON response through its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vizsession_publish::PublishError;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Publishing a snapshot failed outright.
    #[error("publish failed: {0}")]
    Upstream(String),

    /// Some snapshot buffers failed to upload.
    #[error("partial publish: {uploaded} uploaded, {failed} failed")]
    PartialFailure {
        /// Buffers uploaded.
        uploaded: usize,
        /// Buffers that failed.
        failed: usize,
        /// Names of the buffers that failed.
        failed_names: Vec<String>,
    },
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::InvalidName(name) => Self::BadRequest(format!("invalid snapshot name: {name:?}")),
            PublishError::PartialFailure {
                uploaded,
                failed,
                failed_names,
            } => Self::PartialFailure {
                uploaded,
                failed,
                failed_names,
            },
            other @ (PublishError::Encode(_) | PublishError::Metadata(_) | PublishError::Preview(_)) => {
                Self::Upstream(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, mut body) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, serde_json::json!({ "error": msg })),
            Self::PartialFailure {
                uploaded,
                failed,
                failed_names,
            } => (
                StatusCode::MULTI_STATUS,
                serde_json::json!({
                    "error": "partial failure",
                    "uploaded": uploaded,
                    "failed": failed,
                    "failedNames": failed_names,
                }),
            ),
        };

        if let Some(object) = body.as_object_mut() {
            object.insert(String::from("status"), serde_json::json!(status.as_u16()));
        }
        (status, axum::Json(body)).into_response()
    }
}
