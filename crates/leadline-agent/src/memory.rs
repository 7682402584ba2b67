//! Run-scoped side-channel for off-prompt tool results.
//!
//! Tools flagged off-prompt never put their raw payload in front of the
//! model. The payload is stored here under a namespace (`<tool>-<n>`) and the
//! model receives a short reference instead; later it can pull content back
//! through the `memory_query` tool, and later steps can reach it through
//! `{{ memory.<tool> }}` templates.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One stored artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryArtifact {
    /// Namespace the artifact is addressed by.
    pub namespace: String,
    /// Tool that produced it.
    pub tool: String,
    /// Raw payload, unmodified.
    pub payload: Value,
}

#[derive(Debug, Default)]
struct MemoryInner {
    artifacts: Vec<MemoryArtifact>,
    counters: HashMap<String, usize>,
}

/// Shared handle to one run's tool memory.
///
/// Cloning yields another handle onto the same store. Each pipeline run
/// creates its own; nothing is shared between runs.
#[derive(Debug, Clone, Default)]
pub struct ToolMemory {
    inner: Arc<Mutex<MemoryInner>>,
}

impl ToolMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload and return the namespace it was filed under.
    pub fn store(&self, tool: &str, payload: Value) -> String {
        let mut inner = self.inner.lock();
        let counter = inner.counters.entry(tool.to_string()).or_insert(0);
        *counter += 1;
        let namespace = format!("{}-{}", tool, counter);

        inner.artifacts.push(MemoryArtifact {
            namespace: namespace.clone(),
            tool: tool.to_string(),
            payload,
        });
        namespace
    }

    /// Fetch a payload by namespace.
    pub fn get(&self, namespace: &str) -> Option<Value> {
        self.inner
            .lock()
            .artifacts
            .iter()
            .find(|a| a.namespace == namespace)
            .map(|a| a.payload.clone())
    }

    /// Most recent payload stored by `tool`.
    pub fn latest(&self, tool: &str) -> Option<Value> {
        self.inner
            .lock()
            .artifacts
            .iter()
            .rev()
            .find(|a| a.tool == tool)
            .map(|a| a.payload.clone())
    }

    /// All namespaces in insertion order.
    pub fn namespaces(&self) -> Vec<String> {
        self.inner
            .lock()
            .artifacts
            .iter()
            .map(|a| a.namespace.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().artifacts.is_empty()
    }
}

/// Message handed to the model in place of an off-prompt payload.
pub fn reference_message(tool: &str, namespace: &str) -> String {
    format!(
        "Output of \"{tool}\" was stored in memory with memory_name \"{namespace}\". \
         Use the memory_query tool to fetch or search it."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_assigns_sequential_namespaces() {
        let memory = ToolMemory::new();
        assert_eq!(memory.store("web_scrape", json!("page one")), "web_scrape-1");
        assert_eq!(memory.store("web_scrape", json!("page two")), "web_scrape-2");
        assert_eq!(memory.store("company_lookup", json!({})), "company_lookup-1");
        assert_eq!(memory.len(), 3);
        assert_eq!(
            memory.namespaces(),
            vec!["web_scrape-1", "web_scrape-2", "company_lookup-1"]
        );
    }

    #[test]
    fn test_get_and_latest() {
        let memory = ToolMemory::new();
        memory.store("web_scrape", json!("first"));
        memory.store("web_scrape", json!("second"));

        assert_eq!(memory.get("web_scrape-1"), Some(json!("first")));
        assert_eq!(memory.latest("web_scrape"), Some(json!("second")));
        assert_eq!(memory.latest("company_lookup"), None);
        assert_eq!(memory.get("web_scrape-9"), None);
    }

    #[test]
    fn test_clones_share_storage() {
        let memory = ToolMemory::new();
        let handle = memory.clone();
        handle.store("t", json!(1));
        assert!(!memory.is_empty());
    }

    #[test]
    fn test_reference_message_names_namespace() {
        let msg = reference_message("web_scrape", "web_scrape-1");
        assert!(msg.contains("\"web_scrape-1\""));
        assert!(msg.contains("memory_query"));
    }
}
