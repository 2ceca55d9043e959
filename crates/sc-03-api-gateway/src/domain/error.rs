//! Gateway error types and the HTTP error envelope.
//!
//! Every 4xx/5xx response body is `{"error": <reason>, "message": <detail>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sc_01_device_auth::AuthError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::DispatchError;

/// Start-up and lifecycle errors. The only process-fatal errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Preconditions for an enhancement submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Configuration not set")]
    ConfigurationMissing,

    #[error("Image file is required")]
    MissingFile,

    #[error("Session ID is required for WebSocket communication")]
    MissingSessionId,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// JSON error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "You are not authorized to access this resource.",
        )
    }

    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "The requested URL was not found on the server.",
        )
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "The method is not allowed for the requested URL.",
        )
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => ApiError::unauthorized(),
            AuthError::InvalidIdentity(detail) => ApiError::bad_request(detail),
            AuthError::ChallengeExpired { .. } => ApiError::bad_request("Challenge code expired"),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(err: ConfigurationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::QueueFull => ApiError::service_unavailable(err.to_string()),
            DispatchError::Closed => ApiError::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_phrase_in_error_field() {
        let err = ApiError::not_found();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.error, "Not Found");
        assert_eq!(err.message, "The requested URL was not found on the server.");
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(ApiError::from(AuthError::Unauthorized).status, StatusCode::UNAUTHORIZED);

        let invalid = ApiError::from(AuthError::InvalidIdentity("Invalid UUID".into()));
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.message, "Invalid UUID");

        let expired = ApiError::from(AuthError::ChallengeExpired {
            age_ms: 301_000,
            ttl_ms: 300_000,
        });
        assert_eq!(expired.message, "Challenge code expired");

        assert_eq!(
            ApiError::from(AuthError::InvalidResponse).message,
            "Invalid modified code"
        );
    }

    #[test]
    fn test_queue_full_is_503() {
        assert_eq!(
            ApiError::from(DispatchError::QueueFull).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_configuration_error_is_400() {
        let err = ApiError::from(ConfigurationError::ConfigurationMissing);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Configuration not set");
    }
}
