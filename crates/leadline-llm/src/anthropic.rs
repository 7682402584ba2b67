//! Anthropic API backend implementation.
//!
//! This module provides the `AnthropicBackend` which connects to Anthropic's
//! Messages API for Claude completions.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LlmBackend, with_retry};
use crate::error::{LlmError, Result, parse_retry_after};
use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, StopReason, Usage};

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default API version.
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Model used by reasoning steps unless configured otherwise.
pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";

/// Output token cap used by reasoning steps unless configured otherwise.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// API version header.
    pub api_version: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl AnthropicConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("Anthropic API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a shareable backend handle.
    pub fn shared(config: AnthropicConfig) -> Result<Arc<dyn LlmBackend>> {
        Ok(Arc::new(Self::new(config)?))
    }

    /// Build the messages endpoint URL.
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Add authentication and API headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Handle a successful response.
    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: ApiResponse = serde_json::from_str(&body)?;

        Ok(parsed.into())
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
            429 => LlmError::rate_limit(message, retry_after),
            // Anthropic's "overloaded" status is transient
            529 => LlmError::Network(format!("Overloaded: {}", message)),
            500..=599 => LlmError::Backend(format!("Server error: {}", message)),
            _ => LlmError::Backend(message),
        }
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending Anthropic completion request"
        );

        let response = with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "anthropic",
            || async {
                let response = self
                    .add_headers(self.client.post(self.messages_url()))
                    .json(&request)
                    .send()
                    .await?;

                Self::handle_response(response).await
            },
        )
        .await?;

        tracing::debug!(
            id = %response.id,
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Anthropic completion finished"
        );
        Ok(response)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Internal API response structure.
#[derive(Debug, serde::Deserialize)]
struct ApiResponse {
    id: String,
    content: Vec<ApiContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

impl From<ApiResponse> for CompletionResponse {
    fn from(api: ApiResponse) -> Self {
        let content = api
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiContentBlock::Text { text } => Some(ContentBlock::Text { text }),
                ApiContentBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                ApiContentBlock::Other => None,
            })
            .collect();

        let stop_reason = api.stop_reason.as_deref().map(|s| match s {
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        });

        CompletionResponse {
            id: api.id,
            content,
            model: api.model,
            stop_reason,
            usage: Usage::new(api.usage.input_tokens, api.usage.output_tokens),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, serde::Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorDetail {
    message: String,
}
