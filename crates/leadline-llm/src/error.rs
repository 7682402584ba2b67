//! Error types for the LLM crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Backend/API error from the provider.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Network/connectivity error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (API key missing, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rate limit exceeded (retryable with backoff).
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl LlmError {
    /// Create a rate limit error from a provider message.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Get the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

/// Parse a `Retry-After` header value given in whole seconds.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
