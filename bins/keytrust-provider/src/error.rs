//! Error types for the keytrust provider.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Message returned to callers that have not completed registration.
pub const NOT_REGISTERED: &str = "an application must register before use of the provider";

/// Provider domain error.
///
/// `PermissionDenied` and `Forbidden` must stay distinct: the former tells the caller to run
/// the registration flow, the latter rejects a self-identity mismatch.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    // Infrastructure errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ProviderError {
    /// The error raised for any caller without an `api_apps` registration.
    pub fn not_registered() -> Self {
        Self::PermissionDenied(NOT_REGISTERED.to_string())
    }

    /// Error code string for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unsupported(_) => "UNSUPPORTED_OPERATION",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401 - caller must register first
            Self::PermissionDenied(_) => StatusCode::UNAUTHORIZED,

            // 400 Bad Request - caller bug
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,

            // 403 - self-identity mismatch
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            Self::Unsupported(_) => StatusCode::METHOD_NOT_ALLOWED,

            // 500 Internal Server Error
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within response.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ProviderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
