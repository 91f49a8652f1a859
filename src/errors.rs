//! Error types for the AssistGen backend
//!
//! One taxonomy shared by the relay pipeline, the auth layer, and the CLI,
//! with a single mapping onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for the AssistGen service
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream provider connection could not be established
    #[error("upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream provider answered with a non-2xx status
    #[error("upstream provider returned HTTP {status}")]
    UpstreamHttp { status: u16 },

    /// Upstream produced no data within the idle window
    #[error("upstream produced no data for {idle_secs}s")]
    UpstreamTimeout { idle_secs: u64 },

    /// Reading from an in-flight stream failed
    #[error("stream read failed: {0}")]
    StreamRead(String),

    /// Registration with an already-taken username or email
    #[error("username or email already registered")]
    DuplicateUser,

    /// Login with a wrong email/password pair
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Missing, malformed, or expired bearer token
    #[error("unauthorized")]
    Unauthorized,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Database errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Token signing/verification errors
    #[error("token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AssistGen operations
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// HTTP status this error surfaces as when it reaches a handler boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DuplicateUser => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized | AppError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::UpstreamUnavailable(_) | AppError::UpstreamHttp { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_user_maps_to_conflict() {
        assert_eq!(AppError::DuplicateUser.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_auth_errors_map_to_unauthorized() {
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_upstream_errors_map_to_gateway_statuses() {
        assert_eq!(
            AppError::UpstreamUnavailable("connection refused".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::UpstreamHttp { status: 503 }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::UpstreamTimeout { idle_secs: 90 }.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_error_display_carries_status() {
        let err = AppError::UpstreamHttp { status: 429 };
        assert!(err.to_string().contains("429"));
    }
}
