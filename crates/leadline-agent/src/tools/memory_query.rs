//! Model-facing access to the run's tool memory.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::tool::{ParamExt, Tool, ToolContext, payload_to_text};

const DEFAULT_MAX_CHARS: usize = 20_000;
const MAX_SEARCH_LINES: usize = 25;

/// Fetches or searches artifacts stored by off-prompt tools.
#[derive(Debug, Clone)]
pub struct MemoryQueryTool {
    max_chars: usize,
}

impl MemoryQueryTool {
    pub fn new() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn fetch(&self, text: &str) -> String {
        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
            None => text.to_string(),
        }
    }

    fn search(&self, text: &str, query: &str) -> String {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return self.fetch(text);
        }

        let matches: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| {
                let lower = line.to_lowercase();
                terms.iter().any(|t| lower.contains(t.as_str()))
            })
            .take(MAX_SEARCH_LINES)
            .collect();

        if matches.is_empty() {
            format!("No lines matching '{}' found.", query)
        } else {
            matches.join("\n")
        }
    }
}

impl Default for MemoryQueryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MemoryQueryTool {
    fn name(&self) -> &str {
        "memory_query"
    }

    fn description(&self) -> &str {
        "Read content that another tool stored in memory. Use action \"fetch\" to read it, \
         or \"search\" with a query to get only the lines containing the query terms."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["fetch", "search"]
                },
                "memory_name": {
                    "type": "string",
                    "description": "Name the content was stored under, e.g. web_scrape-1"
                },
                "query": {
                    "type": "string",
                    "description": "Terms to search for (search only)"
                }
            },
            "required": ["action", "memory_name"]
        })
    }

    async fn invoke(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let action = input.required_str("action")?;
        let name = input.required_str("memory_name")?;

        let Some(payload) = ctx.memory.get(name) else {
            let known = ctx.memory.namespaces();
            return Err(ToolError::invalid_input(format!(
                "no memory named '{}'; available: [{}]",
                name,
                known.join(", ")
            )));
        };
        let text = payload_to_text(&payload);

        let result = match action {
            "fetch" => self.fetch(&text),
            "search" => self.search(&text, input.optional_str("query").unwrap_or_default()),
            other => {
                return Err(ToolError::invalid_input(format!(
                    "unknown action '{}'; use fetch or search",
                    other
                )));
            }
        };
        Ok(Value::String(result))
    }
}
