//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how each
//! failure is turned into an HTTP response.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codoc_core::{CoreError, PortError};
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

    /// A rejected or failed core operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Core(CoreError::InvalidInput(message.into()))
    }

    /// The status code and the message that is safe to show to clients.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Core(err) => match err {
                CoreError::InvalidInput(_)
                | CoreError::Conflict(_)
                | CoreError::Expired
                | CoreError::Mismatch => (StatusCode::BAD_REQUEST, err.to_string()),
                CoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
                CoreError::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                CoreError::Internal(_) => internal(),
            },
            ApiError::Port(PortError::NotFound(what)) => (StatusCode::NOT_FOUND, what.clone()),
            ApiError::Port(PortError::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                CoreError::Unauthenticated.to_string(),
            ),
            _ => internal(),
        }
    }
}

// Malformed requests are reported as invalid input, never as axum's plain-text
// 415/422 rejections.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
