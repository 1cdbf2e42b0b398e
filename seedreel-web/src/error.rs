//! HTTP mapping of session errors.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use seedreel_core::SessionError;
use tracing::error;

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ApiError {
    /// Status code the client sees.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(SessionError::SessionNotFound { .. })
            | ApiError::Session(SessionError::CaptionNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::RangeUnsatisfiable { .. }) => {
                StatusCode::RANGE_NOT_SATISFIABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response<Body> {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        match self {
            ApiError::Session(SessionError::RangeUnsatisfiable { total }) => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{total}"))],
                SessionError::RangeUnsatisfiable { total }.user_message(),
            )
                .into_response(),
            ApiError::Session(e) => (status, e.user_message()).into_response(),
            ApiError::Response(_) => (status, "Internal server error").into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(SessionError::SessionNotFound { id: "x".into() });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let caption = ApiError::from(SessionError::CaptionNotFound {
            id: "x".into(),
            index: 3,
        });
        assert_eq!(caption.status(), StatusCode::NOT_FOUND);

        let cleanup = ApiError::from(SessionError::CleanupFailure {
            path: "/tmp/x".into(),
            reason: "busy".into(),
        });
        assert_eq!(cleanup.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unsatisfiable_range_carries_total() {
        let response = ApiError::from(SessionError::RangeUnsatisfiable { total: 1000 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    }
}
