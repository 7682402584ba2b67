//! Declarative pipeline definitions.
//!
//! A [`PipelineDefinition`] is an ordered list of [`StepDefinition`]s. It is
//! validated once, when a [`Pipeline`](crate::Pipeline) is built from it;
//! after that the steps are immutable.

use std::collections::{HashMap, HashSet};

use leadline_agent::{OutputFormat, Rule, allows_best_guess};
use serde_json::Value;

use crate::context::{Template, parse_value_templates};
use crate::error::PipelineError;

/// A step that drives the LLM over a declared set of tools.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningDefinition {
    /// Instruction template sent as the user message.
    pub instruction: String,
    /// Behavioral rules, in order.
    pub rules: Vec<Rule>,
    /// Names of the tools the step may call.
    pub tools: Vec<String>,
    /// Shape the final answer must have.
    pub format: OutputFormat,
    /// Template rendered as the answer of last resort under a best-guess rule.
    pub fallback: Option<String>,
}

impl ReasoningDefinition {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            rules: Vec::new(),
            tools: Vec::new(),
            format: OutputFormat::Text,
            fallback: None,
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn fallback(mut self, template: impl Into<String>) -> Self {
        self.fallback = Some(template.into());
        self
    }
}

/// Fixed side-effecting actions.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectAction {
    /// Speak the preceding text output. `None` uses the tool's configured voice.
    Synthesize { voice: Option<String> },
    /// Play the preceding audio artifact.
    Play,
    /// Render the payload template and post it.
    Deliver { payload: Value },
}

impl EffectAction {
    /// Tool the action is carried out by.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Synthesize { .. } => "speech_synthesis",
            Self::Play => "audio_playback",
            Self::Deliver { .. } => "message_post",
        }
    }

    /// Whether the action consumes the preceding step's output.
    pub fn needs_prior_output(&self) -> bool {
        matches!(self, Self::Synthesize { .. } | Self::Play)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Reasoning(ReasoningDefinition),
    Effect(EffectAction),
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    /// Optional id other steps can reference as `{{ <id>.output }}`.
    pub id: Option<String>,
    pub kind: StepKind,
}

impl StepDefinition {
    pub fn reasoning(definition: ReasoningDefinition) -> Self {
        Self {
            id: None,
            kind: StepKind::Reasoning(definition),
        }
    }

    pub fn effect(action: EffectAction) -> Self {
        Self {
            id: None,
            kind: StepKind::Effect(action),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Id, or `#<position>` for unnamed steps.
    pub fn label(&self, position: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("#{}", position),
        }
    }

    /// Names of every tool this step needs from the registry.
    pub fn required_tools(&self) -> Vec<&str> {
        match &self.kind {
            StepKind::Reasoning(def) => def.tools.iter().map(String::as_str).collect(),
            StepKind::Effect(action) => vec![action.tool_name()],
        }
    }

    /// Every template the step renders.
    fn templates(&self) -> Result<Vec<Template>, crate::error::UnresolvedReferenceError> {
        match &self.kind {
            StepKind::Reasoning(def) => {
                let mut templates = vec![Template::parse(&def.instruction)?];
                if let Some(ref fallback) = def.fallback {
                    templates.push(Template::parse(fallback)?);
                }
                Ok(templates)
            }
            StepKind::Effect(EffectAction::Deliver { payload }) => parse_value_templates(payload),
            StepKind::Effect(_) => Ok(Vec::new()),
        }
    }
}

/// An ordered list of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Validate the pipeline structure and every template's scope.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.is_empty() {
            return Err(PipelineError::InvalidPipeline(
                "Pipeline name cannot be empty".into(),
            ));
        }

        if self.steps.is_empty() {
            return Err(PipelineError::InvalidPipeline(
                "Pipeline must have at least one step".into(),
            ));
        }

        // Check for duplicate step IDs
        let mut seen_ids = HashSet::new();
        let mut positions = HashMap::new();
        for (position, step) in self.steps.iter().enumerate() {
            let Some(ref id) = step.id else { continue };
            if id.is_empty() {
                return Err(PipelineError::InvalidPipeline(format!(
                    "Step #{} has an empty ID",
                    position
                )));
            }
            if !seen_ids.insert(id) {
                return Err(PipelineError::InvalidPipeline(format!(
                    "Duplicate step ID: {}",
                    id
                )));
            }
            positions.insert(id.clone(), position);
        }

        for (position, step) in self.steps.iter().enumerate() {
            let label = step.label(position);

            if let StepKind::Effect(action) = &step.kind {
                if action.needs_prior_output() && position == 0 {
                    return Err(PipelineError::InvalidPipeline(format!(
                        "Step '{}' consumes the preceding output but is first",
                        label
                    )));
                }
                if let EffectAction::Deliver { payload } = action
                    && !payload.is_object()
                {
                    return Err(PipelineError::InvalidPipeline(format!(
                        "Step '{}' delivery payload must be a JSON object",
                        label
                    )));
                }
            }

            if let StepKind::Reasoning(def) = &step.kind
                && allows_best_guess(&def.rules)
                && def.fallback.is_none()
            {
                return Err(PipelineError::InvalidPipeline(format!(
                    "Step '{}' allows a best guess but declares no fallback",
                    label
                )));
            }

            let templates = step
                .templates()
                .map_err(|e| PipelineError::unresolved(&label, e))?;
            for template in &templates {
                template
                    .check_scope(position, &positions)
                    .map_err(|e| PipelineError::unresolved(&label, e))?;
            }
        }

        Ok(())
    }
}
