//! Company data lookup through the Proxycurl API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::ToolError;
use crate::tool::{ParamExt, Tool, ToolContext, http_client};

const DEFAULT_BASE_URL: &str = "https://nubela.co/proxycurl";

/// Operations this tool knows how to perform.
const KNOWN_OPERATIONS: &[&str] = &["get_company"];

/// Configuration for company lookups.
#[derive(Debug, Clone)]
pub struct CompanyLookupConfig {
    /// Proxycurl API key.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// Operations the model may request.
    pub allowlist: Vec<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Store results in tool memory instead of the prompt.
    pub off_prompt: bool,
}

impl CompanyLookupConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            allowlist: vec!["get_company".to_string()],
            timeout: Duration::from_secs(30),
            off_prompt: true,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Structured company record lookup keyed by LinkedIn company URL.
#[derive(Debug, Clone)]
pub struct CompanyLookupTool {
    client: Client,
    config: CompanyLookupConfig,
    description: String,
}

impl CompanyLookupTool {
    pub fn new(config: CompanyLookupConfig) -> Result<Self, ToolError> {
        if let Some(unknown) = config
            .allowlist
            .iter()
            .find(|op| !KNOWN_OPERATIONS.contains(&op.as_str()))
        {
            return Err(ToolError::invalid_input(format!(
                "unknown company lookup operation '{}'",
                unknown
            )));
        }

        let client = http_client(config.timeout)?;
        let description = format!(
            "Look up structured company data (industry, size, description, headquarters) \
             from a LinkedIn company URL. Allowed operations: {}.",
            config.allowlist.join(", ")
        );
        Ok(Self {
            client,
            config,
            description,
        })
    }

    async fn get_company(&self, linkedin_url: &str) -> Result<Value, ToolError> {
        let endpoint = format!(
            "{}/api/linkedin/company",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.config.api_key)
            .query(&[("url", linkedin_url)])
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
                format!("company lookup returned {}: {}", status, body),
            ));
        }

        let record: Value = serde_json::from_str(&body)
            .map_err(|e| ToolError::malformed(format!("company record is not JSON: {}", e)))?;
        if !record.is_object() {
            return Err(ToolError::malformed("company record is not an object"));
        }
        Ok(record)
    }
}

#[async_trait]
impl Tool for CompanyLookupTool {
    fn name(&self) -> &str {
        "company_lookup"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": self.config.allowlist,
                    "description": "Lookup operation to perform"
                },
                "linkedin_url": {
                    "type": "string",
                    "description": "LinkedIn company profile URL"
                }
            },
            "required": ["operation", "linkedin_url"]
        })
    }

    fn off_prompt(&self) -> bool {
        self.config.off_prompt
    }

    async fn invoke(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let operation = input.optional_str("operation").unwrap_or("get_company");
        if !self.config.allowlist.iter().any(|op| op == operation) {
            return Err(ToolError::invalid_input(format!(
                "operation '{}' is not allowed; allowed: {}",
                operation,
                self.config.allowlist.join(", ")
            )));
        }

        let linkedin_url = input.required_str("linkedin_url")?;
        tracing::debug!(step = %ctx.step_id, operation, linkedin_url, "Looking up company");

        match operation {
            "get_company" => self.get_company(linkedin_url).await,
            other => Err(ToolError::invalid_input(format!(
                "unsupported operation '{}'",
                other
            ))),
        }
    }
}
