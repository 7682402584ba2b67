//! Tool framework for pipeline capabilities.
//!
//! This module defines the [`Tool`] trait every external capability
//! implements, and the [`ToolRegistry`] steps resolve capabilities from.
//! The pipeline core only ever holds `Arc<dyn Tool>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use leadline_agent::{Tool, ToolContext, ToolError, ToolRegistry};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Tool for Echo {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Returns its input" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn invoke(&self, input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
//!         Ok(input)
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Echo);
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{StepExecutionError, ToolError};
use crate::memory::ToolMemory;

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for pulling typed parameters out of a JSON input.
pub trait ParamExt {
    /// Get a required, non-blank string parameter.
    fn required_str(&self, name: &str) -> Result<&str, ToolError>;

    /// Get an optional string parameter.
    fn optional_str(&self, name: &str) -> Option<&str>;
}

impl ParamExt for Value {
    fn required_str(&self, name: &str) -> Result<&str, ToolError> {
        match self.get(name).and_then(|v| v.as_str()) {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(ToolError::invalid_input(format!(
                "parameter '{}' must not be empty",
                name
            ))),
            None => Err(ToolError::invalid_input(format!(
                "missing required string parameter '{}'",
                name
            ))),
        }
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }
}

/// Render a payload as text for the model or a template.
///
/// Strings pass through untouched; everything else is compact JSON.
pub fn payload_to_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Build an HTTP client with the tool's time budget.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ToolError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("Leadline/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ToolError::Unavailable(format!("failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for pipeline capabilities.
///
/// Each tool defines its input as a JSON Schema and implements async
/// invocation returning a raw JSON payload.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for this tool's parameters.
    fn parameters(&self) -> Value;

    /// Whether results go to the run's tool memory instead of the prompt.
    fn off_prompt(&self) -> bool {
        false
    }

    /// Invoke the capability.
    async fn invoke(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// ID of the pipeline run this call belongs to.
    pub run_id: Uuid,
    /// Step issuing the call.
    pub step_id: String,
    /// The run's off-prompt side-channel.
    pub memory: ToolMemory,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(run_id: Uuid, step_id: impl Into<String>, memory: ToolMemory) -> Self {
        Self {
            run_id,
            step_id: step_id.into(),
            memory,
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(Uuid::new_v4(), "test", ToolMemory::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry for managing available tools.
///
/// Steps hold a filtered view containing only the capabilities they declare.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Convert all tools to LLM tool definitions, ordered by name.
    pub fn to_llm_definitions(&self) -> Vec<leadline_llm::ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                leadline_llm::ToolDefinition::new(
                    tool.name(),
                    tool.description(),
                    tool.parameters(),
                )
            })
            .collect()
    }

    /// Invoke a tool by name, failing the step on any error.
    pub async fn invoke(
        &self,
        name: &str,
        input: Value,
        ctx: &ToolContext,
    ) -> Result<Value, StepExecutionError> {
        let tool = self
            .get(name)
            .ok_or_else(|| StepExecutionError::ToolNotFound(name.to_string()))?;

        tool.invoke(input, ctx)
            .await
            .map_err(|e| StepExecutionError::tool(name, e))
    }

    /// Create a new registry containing only tools whose names are in the allowlist.
    ///
    /// Names not matching any registered tool are silently ignored.
    pub fn filtered_by_names<S: AsRef<str>>(&self, names: &[S]) -> ToolRegistry {
        let tools = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.tools
                    .get(name)
                    .map(|tool| (name.to_string(), Arc::clone(tool)))
            })
            .collect();

        ToolRegistry { tools }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockTool;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// A mock tool for testing.
    ///
    /// Scripted responses are consumed first, then the fixed response is
    /// returned for every further call. Calls are recorded for verification.
    #[derive(Debug)]
    pub struct MockTool {
        name: String,
        description: String,
        parameters: Value,
        off_prompt: bool,
        script: Mutex<VecDeque<Result<Value, ToolError>>>,
        response: Result<Value, ToolError>,
        calls: Mutex<Vec<Value>>,
    }

    impl MockTool {
        /// Create a new mock tool.
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                description: "A mock tool for testing".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {}
                }),
                off_prompt: false,
                script: Mutex::new(VecDeque::new()),
                response: Ok(Value::String("mock response".to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Set the description.
        pub fn with_description(mut self, description: impl Into<String>) -> Self {
            self.description = description.into();
            self
        }

        /// Mark results as off-prompt.
        pub fn off_prompt(mut self) -> Self {
            self.off_prompt = true;
            self
        }

        /// Set the response returned on every call.
        pub fn with_response(mut self, response: Value) -> Self {
            self.response = Ok(response);
            self
        }

        /// Fail every call with the given error.
        pub fn with_error(mut self, error: ToolError) -> Self {
            self.response = Err(error);
            self
        }

        /// Queue one-shot results consumed before the fixed response.
        pub fn with_script(self, script: Vec<Result<Value, ToolError>>) -> Self {
            self.script.lock().extend(script);
            self
        }

        /// Get the inputs of calls made to this tool.
        pub fn calls(&self) -> Vec<Value> {
            self.calls.lock().clone()
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            &self.description
        }

        fn parameters(&self) -> Value {
            self.parameters.clone()
        }

        fn off_prompt(&self) -> bool {
            self.off_prompt
        }

        async fn invoke(&self, input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
            self.calls.lock().push(input);

            if let Some(next) = self.script.lock().pop_front() {
                return next;
            }
            self.response.clone()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
