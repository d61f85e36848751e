//! Error types for ConNix
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Expected absence (no session, no rows) is not an error and never
//! reaches this type: lookups return `Option` or an empty `Vec`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Every variant is fatal to the request that produced it. The response
/// is a bare status line plus a plain-text message, never a structured
/// payload.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Access denied (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// OAuth handshake with the identity provider failed (500)
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing/verification key error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Not implemented (501)
    #[error("Not implemented")]
    NotImplemented,
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(anyhow::anyhow!("Migration failed: {}", err))
    }
}

impl AppError {
    /// HTTP status, client-facing message and metric label for this error
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string(), "forbidden"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::NotImplemented => (
                StatusCode::NOT_IMPLEMENTED,
                "Not implemented".to_string(),
                "not_implemented",
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::OAuth(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "oauth"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Encryption(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "encryption")
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to an HTTP status code and a plain-text
    /// body.
    fn into_response(self) -> Response {
        let (status, message, error_type) = self.parts();

        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(error = %self, error_type, "Request failed");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_implemented_maps_to_501() {
        let response = AppError::NotImplemented.into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn database_errors_hide_details() {
        let (status, message, error_type) = AppError::Database(sqlx::Error::RowNotFound).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Database error");
        assert_eq!(error_type, "database");
    }

    #[test]
    fn oauth_errors_are_fatal_with_message() {
        let (status, message, _) = AppError::OAuth("state mismatch".to_string()).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "state mismatch");
    }
}
