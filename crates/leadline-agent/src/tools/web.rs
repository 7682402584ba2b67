//! Web scraping tool.
//!
//! Fetches a page and reduces it to readable text plus the page's links, so
//! the model can find profile URLs that only appear in `href`s.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

use crate::error::ToolError;
use crate::tool::{ParamExt, Tool, ToolContext, http_client};

/// Configuration for web scraping.
#[derive(Debug, Clone)]
pub struct WebScrapeConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum text length to return.
    pub max_text_length: usize,
    /// Maximum number of links to list.
    pub max_links: usize,
    /// Store results in tool memory instead of the prompt.
    pub off_prompt: bool,
}

impl Default for WebScrapeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            max_text_length: 50_000,
            max_links: 200,
            off_prompt: true,
        }
    }
}

/// Tool for scraping web page content.
#[derive(Debug, Clone)]
pub struct WebScrapeTool {
    client: Client,
    config: WebScrapeConfig,
}

impl WebScrapeTool {
    /// Create a web scrape tool with custom configuration.
    pub fn new(config: WebScrapeConfig) -> Result<Self, ToolError> {
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }

    /// Reduce an HTML document to text followed by its links.
    fn extract_page(&self, html: &str, base: &Url) -> String {
        let document = Html::parse_document(html);
        let mut sections = Vec::new();

        if let Ok(selector) = Selector::parse("title")
            && let Some(title) = document.select(&selector).next()
        {
            let title = title.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                sections.push(format!("Title: {}", title));
            }
        }

        let mut text = String::new();
        if let Ok(body) = Selector::parse("body") {
            for element in document.select(&body) {
                text.push_str(&element.text().collect::<Vec<_>>().join(" "));
            }
        }
        let mut text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.len() > self.config.max_text_length {
            let mut cut = self.config.max_text_length;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push_str("...[truncated]");
        }
        if !text.is_empty() {
            sections.push(text);
        }

        let links = self.extract_links(&document, base);
        if !links.is_empty() {
            sections.push(format!("Links:\n{}", links.join("\n")));
        }

        sections.join("\n\n")
    }

    /// Absolute http(s) links in document order, deduplicated.
    fn extract_links(&self, document: &Html, base: &Url) -> Vec<String> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut links: Vec<String> = Vec::new();
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(url) = base.join(href) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            let url = url.to_string();
            if !links.contains(&url) {
                links.push(url);
            }
            if links.len() >= self.config.max_links {
                break;
            }
        }
        links
    }
}

#[async_trait]
impl Tool for WebScrapeTool {
    fn name(&self) -> &str {
        "web_scrape"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text followed by the absolute links it contains."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The page URL to scrape (http or https)"
                }
            },
            "required": ["url"]
        })
    }

    fn off_prompt(&self) -> bool {
        self.config.off_prompt
    }

    async fn invoke(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let raw = input.required_str("url")?.trim();
        // models often pass a bare domain
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };

        let url = Url::parse(&candidate)
            .map_err(|e| ToolError::invalid_input(format!("Invalid URL '{}': {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::invalid_input(
                "Only HTTP and HTTPS URLs are supported",
            ));
        }

        tracing::debug!(step = %ctx.step_id, url = %url, "Scraping page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::rejected(
                status.as_u16(),
                format!("GET {} returned {}", url, status),
            ));
        }

        // redirects may have moved us; resolve links against the final URL
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.config.timeout))?;

        Ok(Value::String(self.extract_page(&html, &final_url)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
