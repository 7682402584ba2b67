//! LLM Backend trait and implementations.
//!
//! This module defines the abstraction layer over LLM providers and provides
//! a scripted mock implementation for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures and rate limits).
/// Non-retryable errors are returned immediately. A rate limit carrying a
/// `retry-after` hint waits at least that long.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt >= max_retries {
            return Err(err);
        }
        attempt += 1;

        let wait = err.retry_after().map_or(backoff, |hint| hint.max(backoff));
        tracing::warn!(
            backend = backend_name,
            attempt,
            max_retries,
            backoff_ms = wait.as_millis() as u64,
            error = %err,
            "Request failed, retrying"
        );
        tokio::time::sleep(wait).await;
        backoff *= 2;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for LLM backend providers.
///
/// Tools are passed natively through `request.tools`; responses carry
/// structured `tool_use` blocks that the reasoning step dispatches.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is available and properly configured.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A mock backend for testing purposes.
///
/// Returns pre-configured responses in order, useful for deterministic testing
/// of reasoning steps and tool execution. Every request is recorded so tests
/// can assert on prompts and call counts.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    responses: Mutex<Vec<CompletionResponse>>,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend with the given responses.
    ///
    /// Responses are returned in order. If more requests are made than
    /// responses available, an error is returned.
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Mutex::new(responses),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend with a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![CompletionResponse::text_only("mock_msg_1", text)])
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().push(request);

        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            ));
        }
        Ok(responses.remove(0))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBlock, Message, StopReason, Usage};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_mock_backend_single_response() {
        let backend = MockBackend::with_text("Hello!");

        let request = CompletionRequest::new("test-model", vec![Message::user("Hi")], 100);
        let response = backend.complete(request).await.unwrap();

        assert_eq!(response.text(), "Hello!");
        assert_eq!(backend.request_count(), 1);
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn test_mock_backend_multiple_responses() {
        let backend = MockBackend::new(vec![
            CompletionResponse::text_only("msg_1", "First"),
            CompletionResponse::text_only("msg_2", "Second"),
        ]);

        let request = CompletionRequest::new("test-model", vec![Message::user("1")], 100);
        let r1 = backend.complete(request).await.unwrap();

        let request = CompletionRequest::new("test-model", vec![Message::user("2")], 100);
        let r2 = backend.complete(request).await.unwrap();

        assert_eq!(r1.text(), "First");
        assert_eq!(r2.text(), "Second");
        assert_eq!(backend.request_count(), 2);
        assert_eq!(backend.requests()[1].messages[0].content.as_text(), Some("2"));
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new(vec![]);

        let request = CompletionRequest::new("test-model", vec![Message::user("Hi")], 100);
        let result = backend.complete(request).await;

        assert!(matches!(result, Err(LlmError::Backend(_))));
    }

    #[tokio::test]
    async fn test_mock_backend_with_tool_use() {
        let backend = MockBackend::new(vec![CompletionResponse::new(
            "msg_1",
            "model",
            vec![
                ContentBlock::text("Let me check."),
                ContentBlock::tool_use(
                    "tool_1",
                    "web_scrape",
                    serde_json::json!({"url": "https://b.com"}),
                ),
            ],
            StopReason::ToolUse,
            Usage::new(50, 30),
        )]);

        let request = CompletionRequest::new("test-model", vec![Message::user("Find b")], 100);
        let response = backend.complete(request).await.unwrap();

        assert!(response.has_tool_use());
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.tool_uses()[0].name, "web_scrape");
    }

    #[tokio::test]
    async fn test_mock_backend_health_check() {
        let backend = MockBackend::with_text("test");
        assert!(backend.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_errors() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(3, Duration::from_millis(1), "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Network("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_permanent_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(3, Duration::from_millis(1), "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Auth("bad key".into())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, Duration::from_millis(1), "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Network("down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
