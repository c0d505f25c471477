//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error
//! variants. Ownership failures are collapsed into `NotFound` so callers
//! cannot probe for the existence of other principals' devices.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::registry::StorageError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - missing or invalid authentication
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden - authenticated but lacking the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found - target does not exist or is not owned by the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Authentication error with specific error code
    #[error("{message}")]
    AuthError { message: String, code: String },

    /// Domain validation error from the core trust model
    #[error("Invalid input: {0}")]
    Trust(#[from] trustgate_core::TrustError),

    /// Device registry storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Create an authentication error with a specific error code
    pub fn auth_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Trust(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &str {
        match self {
            Self::BadRequest(_) | Self::Trust(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::AuthError { code, .. } => code,
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Storage details (connection strings, SQL) stay in the logs.
            Self::Storage(_) => "A storage error occurred".to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::AuthError { .. } => "auth_error",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Trust(_) => "trust",
            Self::Storage(_) => "storage",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code().to_string();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_) | Self::NotFound(_) | Self::Trust(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::Unauthorized(_) | Self::AuthError { .. } | Self::Forbidden(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Authentication error"
                );
            }
            Self::ServiceUnavailable(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Service unavailable"
                );
            }
            Self::Internal(_) | Self::Storage(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Server error"
                );
            }
        }

        // All error responses share the envelope: success flag, message, code.
        let body = serde_json::json!({
            "success": false,
            "message": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustgate_core::TrustError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(TrustError::SharedDeviceRejected).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::Query("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_error_message_is_sanitized() {
        let err = ApiError::from(StorageError::Connection(
            "postgres://user:secret@db/trustgate".into(),
        ));
        assert_eq!(err.client_message(), "A storage error occurred");
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_trust_error_maps_to_invalid_input() {
        let err = ApiError::from(TrustError::SharedDeviceRejected);
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(err.client_message().contains("shared devices"));
    }

    #[test]
    fn test_auth_error_carries_its_code() {
        let err = ApiError::auth_error("AUTH_TOKEN_EXPIRED", "token has expired");
        assert_eq!(err.error_code(), "AUTH_TOKEN_EXPIRED");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
