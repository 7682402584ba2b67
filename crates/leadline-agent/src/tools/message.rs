//! Outbound message delivery to a chat webhook.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::ToolError;
use crate::tool::{Tool, ToolContext, http_client};

/// Configuration for webhook delivery.
#[derive(Debug, Clone)]
pub struct MessagePostConfig {
    /// Webhook endpoint receiving the JSON payload.
    pub endpoint: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl MessagePostConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Posts a JSON object to the configured webhook.
#[derive(Debug, Clone)]
pub struct MessagePostTool {
    client: Client,
    config: MessagePostConfig,
}

impl MessagePostTool {
    pub fn new(config: MessagePostConfig) -> Result<Self, ToolError> {
        url::Url::parse(&config.endpoint).map_err(|e| {
            ToolError::invalid_input(format!("invalid webhook endpoint '{}': {}", config.endpoint, e))
        })?;
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Tool for MessagePostTool {
    fn name(&self) -> &str {
        "message_post"
    }

    fn description(&self) -> &str {
        "Send a message to the team chat. The input object is posted as-is."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "email": { "type": "string" },
                "summary": { "type": "string" },
                "url": { "type": "string" }
            },
            "additionalProperties": { "type": "string" }
        })
    }

    async fn invoke(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        if !input.is_object() {
            return Err(ToolError::invalid_input("message payload must be a JSON object"));
        }

        tracing::info!(
            run_id = %ctx.run_id,
            step = %ctx.step_id,
            fields = input.as_object().map_or(0, |o| o.len()),
            "Posting message"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&input)
            .send()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.config.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.config.timeout))?;

        if !status.is_success() {
            return Err(ToolError::rejected(
                status.as_u16(),
                format!("webhook returned {}: {}", status, body),
            ));
        }

        let reply = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        Ok(json!({
            "status": status.as_u16(),
            "response": reply,
        }))
    }
}
