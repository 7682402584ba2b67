//! Error types for the agent crate.

use std::time::Duration;
use thiserror::Error;

use crate::reasoning::Phase;

/// Failure of a single capability invocation.
///
/// Cloneable so a failure can be both recorded on the step's tool-call log
/// and reported back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The capability did not answer within its time budget.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The remote side refused the request (non-success status, connection refused).
    #[error("rejected by remote: {message}")]
    RemoteRejection {
        status: Option<u16>,
        message: String,
    },

    /// The remote answered but the body could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The input payload failed parameter validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A local resource the capability needs is not usable (file system, player binary).
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ToolError {
    /// Create a rejection carrying an HTTP status.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRejection {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a malformed response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Returns true for timeouts, the only kind eligible for retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Map a reqwest failure, using `timeout` as the reported budget.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::RemoteRejection {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

/// Failure of a whole step: it could not produce a valid output.
#[derive(Debug, Error)]
pub enum StepExecutionError {
    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] leadline_llm::LlmError),

    /// A tool failed and the step's policy does not recover from it.
    #[error("tool '{tool}' failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },

    /// Tool not found in registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Maximum iterations exceeded.
    #[error("Maximum iterations exceeded: {0}")]
    MaxIterations(u32),

    /// The model produced no answer.
    #[error("step produced an empty output")]
    EmptyOutput,

    /// The answer failed post-validation.
    #[error("invalid output '{answer}': {reason}")]
    InvalidOutput { answer: String, reason: String },

    /// The step's fallback answer could not be rendered.
    #[error("fallback could not be rendered: {0}")]
    Fallback(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The preceding output is not of the kind this step consumes.
    #[error("expected {expected} input, found {found}")]
    UnexpectedInput {
        expected: &'static str,
        found: String,
    },

    /// The reasoning loop attempted a transition outside its state machine.
    #[error("illegal reasoning transition {from:?} -> {to:?}")]
    IllegalTransition { from: Phase, to: Phase },
}

impl StepExecutionError {
    /// Create a tool failure error.
    pub fn tool(tool: impl Into<String>, source: ToolError) -> Self {
        Self::Tool {
            tool: tool.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::Timeout(Duration::from_millis(1000));
        assert_eq!(err.to_string(), "timed out after 1000ms");
        assert!(err.is_timeout());

        let err = ToolError::rejected(404, "not found");
        assert!(err.to_string().contains("not found"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_step_error_wraps_tool_error() {
        let err = StepExecutionError::tool(
            "web_scrape",
            ToolError::Timeout(Duration::from_secs(1)),
        );
        assert!(err.to_string().contains("web_scrape"));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_tool_not_found() {
        let err = StepExecutionError::ToolNotFound("unknown_tool".to_string());
        assert!(err.to_string().contains("Tool not found"));
    }
}
