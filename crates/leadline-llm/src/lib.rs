//! LLM backend abstraction for Leadline.
//!
//! Reasoning steps talk to a language model through the [`LlmBackend`] trait
//! so the pipeline never depends on a concrete provider. The production
//! backend is Anthropic's Messages API; tests use [`MockBackend`], which
//! replays scripted responses in order.
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │  LlmBackend trait                │
//! │  - complete() -> Response        │
//! └──────────────────────────────────┘
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!   ┌──────────┐     ┌─────────────┐
//!   │Anthropic │     │ MockBackend │
//!   └──────────┘     └─────────────┘
//! ```

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod types;

pub use anthropic::{AnthropicBackend, AnthropicConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
pub use backend::{LlmBackend, MockBackend, SharedBackend, with_retry};
pub use error::{LlmError, Result};
pub use types::{
    CompletionRequest, CompletionResponse, Content, ContentBlock, Message, Role, StopReason,
    ToolDefinition, ToolResultBlock, ToolUseBlock, Usage,
};
