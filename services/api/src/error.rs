//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, including the
//! mapping from port errors to HTTP responses used by every handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use readcircle_core::ports::PortError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a 400 validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Port(PortError::Validation(message.into()))
    }

    /// Shorthand for a 404.
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Port(PortError::NotFound(message.into()))
    }

    /// Shorthand for a 401.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Port(PortError::Unauthorized(message.into()))
    }
}

impl IntoResponse for ApiError {
    /// Maps the error taxonomy onto HTTP statuses with a JSON `{"error": ...}`
    /// body. Infrastructure failures are logged here and surfaced as a generic
    /// 500 so internals never leak to clients.
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Port(PortError::Validation(m)) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Port(PortError::NotFound(m)) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Port(PortError::Conflict(m)) => (StatusCode::CONFLICT, m.clone()),
            ApiError::Port(PortError::Unauthorized(m)) => (StatusCode::UNAUTHORIZED, m.clone()),
            other => {
                error!("request failed: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
