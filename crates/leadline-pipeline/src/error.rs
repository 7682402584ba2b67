//! Error types for the pipeline engine.

use leadline_agent::StepExecutionError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A template names something that is not in scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unresolved reference '{{{{ {reference} }}}}': {reason}")]
pub struct UnresolvedReferenceError {
    /// The expression as written between the braces.
    pub reference: String,
    /// Why it could not be resolved.
    pub reason: String,
}

impl UnresolvedReferenceError {
    pub fn new(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

/// Why a single step failed at run time.
#[derive(Debug, Error)]
pub enum StepError {
    /// A template could not be rendered against the run so far.
    #[error(transparent)]
    Render(#[from] UnresolvedReferenceError),

    /// The step ran and could not produce a valid output.
    #[error(transparent)]
    Execution(#[from] StepExecutionError),
}

/// The first failing step of a run. Later steps never executed.
#[derive(Debug, Error)]
#[error("step '{step_id}' failed: {cause}")]
pub struct PipelineExecutionError {
    /// Step id, or `#<position>` for unnamed steps.
    pub step_id: String,
    /// Zero-based position of the step.
    pub position: usize,
    #[source]
    pub cause: StepError,
}

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A step template references something outside its scope.
    #[error("step '{step}': {source}")]
    UnresolvedReference {
        step: String,
        #[source]
        source: UnresolvedReferenceError,
    },

    /// Invalid pipeline definition.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A run failed.
    #[error(transparent)]
    Execution(#[from] PipelineExecutionError),
}

impl PipelineError {
    pub fn unresolved(step: impl Into<String>, source: UnresolvedReferenceError) -> Self {
        Self::UnresolvedReference {
            step: step.into(),
            source,
        }
    }
}
