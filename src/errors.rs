//! API error taxonomy and HTTP mapping.
//!
//! Client errors (not found, invalid input, state conflicts) abort the
//! operation synchronously with no partial writes and name the violated
//! precondition. Storage-layer git failures never surface here — they
//! are logged and swallowed where they occur, because the document file
//! on disk is the source of truth and version control is an audit layer.
//!
//! All error responses share one JSON shape:
//! `{"error": "<message>", "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid input: bad slug, no-change fork, disallowed operation.
    #[error("{0}")]
    BadRequest(String),

    /// A referenced recipe or fork does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with current state (name collision,
    /// stale version, missing merge history).
    #[error("{0}")]
    Conflict(String),

    /// Unexpected internal failure. The detail is logged, not leaked.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::bad_request("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_message_passthrough() {
        assert_eq!(
            ApiError::bad_request("No changes from base recipe").to_string(),
            "No changes from base recipe"
        );
    }
}
