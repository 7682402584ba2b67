//! Per-run state: the argument, the outputs recorded so far and the run's
//! tool memory.

use std::fmt;

use leadline_agent::ToolMemory;
use serde::Serialize;
use uuid::Uuid;

/// Result of executing one step. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
    /// Final answer of a reasoning step.
    Text { text: String },
    /// Reference to a synthesized audio file.
    Artifact {
        id: String,
        location: String,
        media_type: String,
    },
    /// Playback finished; nothing to pass on.
    Void,
    /// Acknowledgment returned by the delivery endpoint.
    Delivered { ack: String },
}

impl StepOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Short name of the variant, used in errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Artifact { .. } => "artifact",
            Self::Void => "void",
            Self::Delivered { .. } => "delivered",
        }
    }

    /// The text a template reference to this output renders as.
    pub fn render(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Artifact { id, .. } => id,
            Self::Void => "",
            Self::Delivered { ack } => ack,
        }
    }
}

impl fmt::Display for StepOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.render())
    }
}

/// A step output together with the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedOutput {
    pub step_id: Option<String>,
    pub position: usize,
    pub output: StepOutput,
}

/// One invocation of a pipeline. Never persisted.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub argument: String,
    outputs: Vec<RecordedOutput>,
    memory: ToolMemory,
}

impl PipelineRun {
    pub fn new(argument: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            argument: argument.into(),
            outputs: Vec::new(),
            memory: ToolMemory::new(),
        }
    }

    /// Outputs recorded so far, in step order.
    pub fn outputs(&self) -> &[RecordedOutput] {
        &self.outputs
    }

    pub fn memory(&self) -> &ToolMemory {
        &self.memory
    }

    /// Append the output of the step at the next position.
    pub fn record(&mut self, step_id: Option<String>, output: StepOutput) {
        let position = self.outputs.len();
        self.outputs.push(RecordedOutput {
            step_id,
            position,
            output,
        });
    }

    pub fn last(&self) -> Option<&StepOutput> {
        self.outputs.last().map(|r| &r.output)
    }

    pub fn into_result(self) -> RunResult {
        RunResult {
            run_id: self.run_id,
            argument: self.argument,
            outputs: self.outputs,
        }
    }
}

/// What a completed run reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub argument: String,
    pub outputs: Vec<RecordedOutput>,
}

impl RunResult {
    /// Output of the step with the given id.
    pub fn output(&self, step_id: &str) -> Option<&StepOutput> {
        self.outputs
            .iter()
            .find(|r| r.step_id.as_deref() == Some(step_id))
            .map(|r| &r.output)
    }

    /// Outputs in step order, without run-specific identifiers.
    pub fn ordered_outputs(&self) -> Vec<&StepOutput> {
        self.outputs.iter().map(|r| &r.output).collect()
    }
}
