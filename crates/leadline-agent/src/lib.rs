//! Tool adapters and the reasoning step for Leadline.
//!
//! Every external capability the pipeline uses is wrapped in the [`Tool`]
//! trait and looked up through a [`ToolRegistry`]. A [`ReasoningStep`] drives
//! an LLM over a declared subset of those tools until it produces an answer
//! that passes its [`OutputFormat`] checkpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ReasoningStep                                              │
//! │  - AwaitingDecision → ToolInFlight → … → Finalizing → Done  │
//! │  - applies rules, failure policy, post-validation           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!       ┌────────────┐  ┌────────────┐  ┌────────────┐
//!       │ LlmBackend │  │ToolRegistry│  │ ToolMemory │
//!       │            │  │            │  │ (per run)  │
//!       └────────────┘  └────────────┘  └────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod output;
pub mod reasoning;
pub mod rules;
pub mod tool;
pub mod tools;

pub use error::{StepExecutionError, ToolError};
pub use memory::{MemoryArtifact, ToolMemory, reference_message};
pub use output::OutputFormat;
pub use reasoning::{
    Fallback, FallbackError, Phase, ReasoningConfig, ReasoningOutcome, ReasoningStep,
    ReasoningTask, ToolCall,
};
pub use rules::{Rule, RuleKind, ToolFailurePolicy, allows_best_guess};
pub use tool::{ParamExt, Tool, ToolContext, ToolRegistry, payload_to_text};

#[cfg(any(test, feature = "testing"))]
pub use tool::MockTool;

pub use tools::{
    AudioPlaybackTool, CompanyLookupConfig, CompanyLookupTool, MemoryQueryTool, MessagePostConfig,
    MessagePostTool, PlaybackConfig, SpeechConfig, SpeechSynthesisTool, WebScrapeConfig,
    WebScrapeTool, voice_id,
};
