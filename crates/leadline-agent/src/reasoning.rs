//! The reasoning step: an LLM-driven loop over a declared toolset.
//!
//! The loop is a bounded state machine:
//!
//! ```text
//!  AwaitingDecision ──tool_use──▶ ToolInFlight ──results──▶ AwaitingDecision
//!        │
//!        └──text──▶ Finalizing ──valid──▶ Done
//!                       │
//!                       └──invalid, best guess allowed──▶ AwaitingDecision (once)
//! ```
//!
//! The backend decides which edge is taken; [`Phase::can_transition`] fixes
//! which edges exist. Every answer passes the [`OutputFormat`] checkpoint
//! after `Finalizing`.

use leadline_llm::{
    CompletionRequest, ContentBlock, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, Message, SharedBackend,
    ToolResultBlock, ToolUseBlock, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Instant;

use crate::error::{StepExecutionError, ToolError};
use crate::memory::reference_message;
use crate::output::OutputFormat;
use crate::rules::{Rule, ToolFailurePolicy, allows_best_guess, system_prompt};
use crate::tool::{ToolContext, ToolRegistry, payload_to_text};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime configuration shared by every reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Model requested from the backend.
    pub model: String,
    /// Output token cap per completion.
    pub max_tokens: u32,
    /// Completions allowed per step before giving up.
    pub max_iterations: u32,
    /// Extra attempts for tool calls that time out.
    pub tool_retries: u32,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_iterations: 10,
            tool_retries: 0,
            temperature: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State Machine
// ─────────────────────────────────────────────────────────────────────────────

/// Phase of the reasoning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    AwaitingDecision,
    ToolInFlight,
    Finalizing,
    Done,
}

impl Phase {
    /// The fixed set of legal transitions.
    pub fn can_transition(self, to: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, to),
            (AwaitingDecision, ToolInFlight)
                | (AwaitingDecision, Finalizing)
                | (ToolInFlight, AwaitingDecision)
                | (Finalizing, AwaitingDecision)
                | (Finalizing, Done)
        )
    }
}

/// Tracks the current phase and the path taken.
#[derive(Debug)]
struct Machine {
    phase: Phase,
    trace: Vec<Phase>,
}

impl Machine {
    fn new() -> Self {
        Self {
            phase: Phase::AwaitingDecision,
            trace: vec![Phase::AwaitingDecision],
        }
    }

    fn advance(&mut self, to: Phase) -> Result<(), StepExecutionError> {
        if !self.phase.can_transition(to) {
            return Err(StepExecutionError::IllegalTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        self.trace.push(to);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task & Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Boxed error from rendering a fallback.
pub type FallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Source of a step's fallback answer.
///
/// Rendered only when the loop settles on the fallback, so it may read
/// tool memory written earlier in the same step.
pub trait Fallback: fmt::Debug + Send + Sync {
    fn render(&self) -> Result<String, FallbackError>;
}

impl Fallback for String {
    fn render(&self) -> Result<String, FallbackError> {
        Ok(self.clone())
    }
}

/// One invocation's worth of input to a reasoning step.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningTask<'a> {
    /// Rendered instruction text.
    pub instruction: &'a str,
    /// Behavioral rules, in order.
    pub rules: &'a [Rule],
    /// Capabilities the step may call.
    pub tools: &'a ToolRegistry,
    /// Required answer shape.
    pub format: OutputFormat,
    /// Fallback answer used when a best guess is allowed.
    pub fallback: Option<&'a dyn Fallback>,
}

/// Record of one capability invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub input: Value,
    pub result: Result<Value, ToolError>,
}

/// Successful result of a reasoning step.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    /// Final, validated answer.
    pub text: String,
    /// Completions requested.
    pub iterations: u32,
    /// Tool invocations in issue order.
    pub tool_calls: Vec<ToolCall>,
    /// Phases visited, starting with `AwaitingDecision`.
    pub trace: Vec<Phase>,
    /// Aggregated token usage.
    pub usage: Usage,
    /// Whether the answer came from the fallback template.
    pub used_fallback: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reasoning Step
// ─────────────────────────────────────────────────────────────────────────────

/// Executes reasoning tasks against an LLM backend.
#[derive(Clone)]
pub struct ReasoningStep {
    backend: SharedBackend,
    config: ReasoningConfig,
}

impl ReasoningStep {
    pub fn new(backend: SharedBackend, config: ReasoningConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    /// Run the loop until a validated answer or a failure.
    pub async fn execute(
        &self,
        task: ReasoningTask<'_>,
        ctx: &ToolContext,
    ) -> Result<ReasoningOutcome, StepExecutionError> {
        let best_guess = allows_best_guess(task.rules);
        let policy = ToolFailurePolicy::from_rules(task.rules);
        let system = system_prompt(task.rules);
        let definitions = task.tools.to_llm_definitions();

        let mut machine = Machine::new();
        let mut messages = vec![Message::user(task.instruction)];
        let mut tool_calls = Vec::new();
        let mut usage = Usage::default();
        let mut iterations = 0u32;
        let mut reprompted = false;

        tracing::info!(
            run_id = %ctx.run_id,
            step = %ctx.step_id,
            tools = %task.tools.names().join(", "),
            rules = task.rules.len(),
            format = ?task.format,
            "Reasoning started"
        );

        loop {
            iterations += 1;
            if iterations > self.config.max_iterations {
                tracing::warn!(
                    run_id = %ctx.run_id,
                    step = %ctx.step_id,
                    iterations,
                    "Max iterations exceeded"
                );
                if best_guess && let Some(answer) = self.fallback_answer(&task)? {
                    machine.advance(Phase::Finalizing)?;
                    machine.advance(Phase::Done)?;
                    return Ok(ReasoningOutcome {
                        text: answer,
                        iterations: iterations - 1,
                        tool_calls,
                        trace: machine.trace,
                        usage,
                        used_fallback: true,
                    });
                }
                return Err(StepExecutionError::MaxIterations(self.config.max_iterations));
            }

            let mut request =
                CompletionRequest::new(&self.config.model, messages.clone(), self.config.max_tokens);
            if let Some(ref system) = system {
                request = request.with_system(system);
            }
            if let Some(temp) = self.config.temperature {
                request = request.with_temperature(temp);
            }
            if !definitions.is_empty() {
                request = request.with_tools(definitions.clone());
            }

            let call_start = Instant::now();
            let response = self.backend.complete(request).await.map_err(|e| {
                tracing::error!(
                    run_id = %ctx.run_id,
                    step = %ctx.step_id,
                    iteration = iterations,
                    error = %e,
                    "LLM call failed"
                );
                StepExecutionError::from(e)
            })?;
            usage.input_tokens += response.usage.input_tokens;
            usage.output_tokens += response.usage.output_tokens;

            tracing::debug!(
                run_id = %ctx.run_id,
                step = %ctx.step_id,
                iteration = iterations,
                stop_reason = ?response.stop_reason,
                has_tool_use = response.has_tool_use(),
                duration_ms = call_start.elapsed().as_millis() as u64,
                "LLM response received"
            );

            if response.has_tool_use() {
                machine.advance(Phase::ToolInFlight)?;

                let mut results = Vec::new();
                for tool_use in response.tool_uses() {
                    let (call, block) = self.run_tool(&tool_use, task.tools, policy, ctx).await?;
                    tool_calls.push(call);
                    results.push(block);
                }

                messages.push(Message::assistant_blocks(response.content.clone()));
                messages.push(Message::tool_results(results));
                machine.advance(Phase::AwaitingDecision)?;
                continue;
            }

            machine.advance(Phase::Finalizing)?;
            let raw = response.text();

            match task.format.checkpoint(&raw) {
                Ok(answer) => {
                    machine.advance(Phase::Done)?;
                    tracing::info!(
                        run_id = %ctx.run_id,
                        step = %ctx.step_id,
                        iterations,
                        tool_calls = tool_calls.len(),
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Reasoning completed"
                    );
                    return Ok(ReasoningOutcome {
                        text: answer,
                        iterations,
                        tool_calls,
                        trace: machine.trace,
                        usage,
                        used_fallback: false,
                    });
                }
                Err(reason) if best_guess && !reprompted => {
                    tracing::warn!(
                        run_id = %ctx.run_id,
                        step = %ctx.step_id,
                        reason = %reason,
                        "Answer failed validation, re-prompting"
                    );
                    reprompted = true;
                    messages.push(Message::assistant_blocks(vec![ContentBlock::text(
                        if raw.trim().is_empty() { "(no answer)" } else { raw.as_str() },
                    )]));
                    messages.push(Message::user(task.format.corrective_prompt(&reason)));
                    machine.advance(Phase::AwaitingDecision)?;
                }
                Err(reason) => {
                    if best_guess && let Some(answer) = self.fallback_answer(&task)? {
                        tracing::warn!(
                            run_id = %ctx.run_id,
                            step = %ctx.step_id,
                            reason = %reason,
                            fallback = %answer,
                            "Using fallback answer"
                        );
                        machine.advance(Phase::Done)?;
                        return Ok(ReasoningOutcome {
                            text: answer,
                            iterations,
                            tool_calls,
                            trace: machine.trace,
                            usage,
                            used_fallback: true,
                        });
                    }

                    let answer = task.format.normalize(&raw);
                    if answer.is_empty() {
                        return Err(StepExecutionError::EmptyOutput);
                    }
                    return Err(StepExecutionError::InvalidOutput { answer, reason });
                }
            }
        }
    }

    /// The rendered fallback, if it passes the checkpoint itself.
    fn fallback_answer(
        &self,
        task: &ReasoningTask<'_>,
    ) -> Result<Option<String>, StepExecutionError> {
        let Some(fallback) = task.fallback else {
            return Ok(None);
        };
        let rendered = fallback.render().map_err(StepExecutionError::Fallback)?;
        match task.format.checkpoint(&rendered) {
            Ok(answer) => Ok(Some(answer)),
            Err(reason) => {
                tracing::warn!(fallback = %rendered, reason = %reason, "Fallback answer is itself invalid");
                Ok(None)
            }
        }
    }

    /// Execute one tool use, applying retries and the failure policy.
    async fn run_tool(
        &self,
        tool_use: &ToolUseBlock,
        tools: &ToolRegistry,
        policy: ToolFailurePolicy,
        ctx: &ToolContext,
    ) -> Result<(ToolCall, ToolResultBlock), StepExecutionError> {
        let Some(tool) = tools.get(&tool_use.name) else {
            tracing::warn!(
                step = %ctx.step_id,
                tool = %tool_use.name,
                "Model requested an undeclared tool"
            );
            let message = format!(
                "The tool '{}' does not exist. Available tools are: {}.",
                tool_use.name,
                tools.names().join(", ")
            );
            let call = ToolCall {
                tool: tool_use.name.clone(),
                input: tool_use.input.clone(),
                result: Err(ToolError::invalid_input(message.clone())),
            };
            return Ok((call, ToolResultBlock::error(&tool_use.id, message)));
        };

        let started = Instant::now();
        let mut attempt = 0u32;
        let result = loop {
            match tool.invoke(tool_use.input.clone(), ctx).await {
                Err(e) if e.is_timeout() && attempt < self.config.tool_retries => {
                    attempt += 1;
                    tracing::warn!(
                        step = %ctx.step_id,
                        tool = %tool_use.name,
                        attempt,
                        max_retries = self.config.tool_retries,
                        "Tool timed out, retrying"
                    );
                }
                other => break other,
            }
        };

        tracing::debug!(
            run_id = %ctx.run_id,
            step = %ctx.step_id,
            tool = %tool_use.name,
            success = result.is_ok(),
            attempts = attempt + 1,
            duration_ms = started.elapsed().as_millis() as u64,
            "Tool: completed"
        );

        let block = match &result {
            Ok(payload) if tool.off_prompt() => {
                let namespace = ctx.memory.store(tool.name(), payload.clone());
                ToolResultBlock::success(&tool_use.id, reference_message(tool.name(), &namespace))
            }
            Ok(payload) => ToolResultBlock::success(&tool_use.id, payload_to_text(payload)),
            Err(e) => match policy {
                ToolFailurePolicy::Propagate => {
                    tracing::warn!(
                        step = %ctx.step_id,
                        tool = %tool_use.name,
                        error = %e,
                        "Tool failed, failing step"
                    );
                    return Err(StepExecutionError::tool(&tool_use.name, e.clone()));
                }
                ToolFailurePolicy::ReportToModel => {
                    tracing::warn!(
                        step = %ctx.step_id,
                        tool = %tool_use.name,
                        error = %e,
                        "Tool failed, reporting to model"
                    );
                    ToolResultBlock::error(&tool_use.id, e.to_string())
                }
            },
        };

        let call = ToolCall {
            tool: tool_use.name.clone(),
            input: tool_use.input.clone(),
            result,
        };
        Ok((call, block))
    }
}

impl std::fmt::Debug for ReasoningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningStep")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
