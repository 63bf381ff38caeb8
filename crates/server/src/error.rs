//! Structured errors for the chordium HTTP surface.
//!
//! Bodies are `{ "code", "message" }` JSON with a matching status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chordium_client::StoreError;
use serde::Serialize;

use crate::gateway::GatewayError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Structured errors for the chordium server.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid input parameters (e.g., empty artist path).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The scraping source failed and no cached copy was available.
    #[error("{0}")]
    Source(chordium_core::Error),

    /// The object store failed on an operation with no fallback.
    #[error("STORE_ERROR: {0}")]
    Store(StoreError),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Source(e) => ApiError::Source(e),
            GatewayError::Store(e) => ApiError::Store(e),
        }
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Source(e) => e.code(),
            ApiError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Source(chordium_core::Error::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            ApiError::Source(chordium_core::Error::FetchTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Source(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorResponse { code: self.code().to_string(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_keep_core_code() {
        let err = ApiError::from(GatewayError::Source(chordium_core::Error::HttpError("status 500".into())));
        assert_eq!(err.code(), "HTTP_ERROR");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "HTTP_ERROR: status 500");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Source(chordium_core::Error::FetchTimeout("x".into())).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        let store = ApiError::from(GatewayError::Store(StoreError::Backend("down".into())));
        assert_eq!(store.code(), "STORE_ERROR");
        assert_eq!(store.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
