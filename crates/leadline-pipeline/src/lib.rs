//! Sequential step pipeline for Leadline.
//!
//! A [`Pipeline`] owns an ordered list of steps and runs them strictly in
//! sequence. Each step's output is recorded on the run and can be referenced
//! by later steps through `{{ ... }}` templates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Pipeline::run(argument)                                │
//! │  - one PipelineRun per call (outputs + tool memory)     │
//! │  - first failing step halts the run                     │
//! └─────────────────────────────────────────────────────────┘
//!            │                                │
//!            ▼                                ▼
//!   ┌─────────────────┐              ┌─────────────────┐
//!   │ reasoning step  │              │  effect step    │
//!   │ (leadline-agent)│              │ synthesize/play │
//!   │                 │              │ /deliver        │
//!   └─────────────────┘              └─────────────────┘
//!            │                                │
//!            └──────────► ContextResolver ◄───┘
//! ```

pub mod context;
pub mod definition;
pub mod effect;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod run;

pub use context::{ContextResolver, Expression, Filter, Reference, Template, render};
pub use definition::{
    EffectAction, PipelineDefinition, ReasoningDefinition, StepDefinition, StepKind,
};
pub use engine::{Pipeline, SharedPipeline};
pub use enrichment::{enrichment_definition, enrichment_pipeline};
pub use error::{
    PipelineError, PipelineExecutionError, Result, StepError, UnresolvedReferenceError,
};
pub use run::{PipelineRun, RecordedOutput, RunResult, StepOutput};
