//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Message returned when no checkout session URL could be obtained.
pub const CHECKOUT_FAILED_MESSAGE: &str = "Failed to create checkout session";

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The payment provider gave no session URL.
    #[error("{CHECKOUT_FAILED_MESSAGE}")]
    CheckoutFailed,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<leadline_config::ConfigError> for ServerError {
    fn from(e: leadline_config::ConfigError) -> Self {
        match e {
            leadline_config::ConfigError::MissingField { field, context } => {
                ServerError::Config(format!("Missing field '{}' in {}", field, context))
            }
            leadline_config::ConfigError::SecretNotFound { name, env_var } => {
                ServerError::Config(format!("{} not found (set {})", name, env_var))
            }
            _ => ServerError::Config(e.to_string()),
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::CheckoutFailed => (StatusCode::INTERNAL_SERVER_ERROR, "checkout_failed"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        };

        let message = self.to_string();

        match &self {
            ServerError::BadRequest(_) => {
                tracing::warn!(status = %status, code, error = %message, "Client error");
            }
            _ => {
                tracing::error!(status = %status, code, error = %message, "Server error");
            }
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
