//! Error types for the AgroSense gateway
//!
//! One enum covers every failure a route can surface. `status_code()` maps a
//! variant to its HTTP status and `to_body()` produces the JSON error body.

use hyper::StatusCode;
use serde::Serialize;

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Phone already registered")]
    DuplicateIdentity,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Prediction service failure: {0}")]
    Upstream(String),

    #[error("History write failed: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body returned to clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
}

impl GatewayError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateIdentity => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the client
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity => "DUPLICATE_IDENTITY",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Upstream(_) => "UPSTREAM_FAILURE",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::Database(_) => "DB_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message. Server-side failures keep their details in the
    /// logs and only expose a short summary.
    pub fn client_message(&self) -> String {
        match self {
            Self::Upstream(_) => "Prediction service unavailable".to_string(),
            Self::Persistence(_) | Self::Database(_) => "Database not available".to_string(),
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Build the JSON body for this error
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.client_message(),
            code: self.code(),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid JSON: {}", err))
    }
}

impl From<mongodb::error::Error> for GatewayError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for GatewayError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthenticated(format!("JWT error: {}", err))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<multer::Error> for GatewayError {
    fn from(err: multer::Error) -> Self {
        Self::Validation(format!("Invalid multipart body: {}", err))
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_4xx() {
        assert_eq!(GatewayError::DuplicateIdentity.status_code(), StatusCode::CONFLICT);
        assert_eq!(GatewayError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::Unauthenticated("Token expired".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Validation("Image file is required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_upstream_failure_is_500() {
        let err = GatewayError::Upstream("connection refused".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "UPSTREAM_FAILURE");
    }

    #[test]
    fn test_server_details_not_exposed() {
        let body = GatewayError::Database("auth failed for user admin".into()).to_body();
        assert_eq!(body.message, "Database not available");

        let body = GatewayError::Validation("Missing required fields: phone".into()).to_body();
        assert_eq!(body.message, "Missing required fields: phone");
        assert_eq!(body.code, "VALIDATION_ERROR");
    }
}
