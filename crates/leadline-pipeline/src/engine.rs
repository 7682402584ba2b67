//! Pipeline engine: runs steps strictly in order, threading outputs forward.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use leadline_agent::{
    Fallback, FallbackError, ReasoningConfig, ReasoningStep, ReasoningTask, ToolContext,
    ToolRegistry,
};
use leadline_llm::SharedBackend;

use crate::context::ContextResolver;
use crate::definition::{PipelineDefinition, StepDefinition, StepKind};
use crate::effect;
use crate::error::{PipelineError, PipelineExecutionError, StepError};
use crate::run::{PipelineRun, RunResult, StepOutput};

/// A validated step with the tool subset it may use.
#[derive(Debug)]
struct PlannedStep {
    label: String,
    definition: StepDefinition,
    tools: ToolRegistry,
}

/// A fallback template, rendered against the run only if the step settles
/// on it.
struct DeferredFallback<'r, 'a> {
    template: &'r str,
    resolver: &'r ContextResolver<'a>,
}

impl fmt::Debug for DeferredFallback<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredFallback")
            .field("template", &self.template)
            .finish()
    }
}

impl Fallback for DeferredFallback<'_, '_> {
    fn render(&self) -> Result<String, FallbackError> {
        Ok(self.resolver.render_str(self.template)?)
    }
}

/// A validated, immutable pipeline. Each [`run`](Pipeline::run) gets its own
/// [`PipelineRun`]; nothing is shared between runs except the tools and the
/// LLM backend.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    steps: Vec<PlannedStep>,
    reasoner: ReasoningStep,
}

/// Shared handle to a pipeline.
pub type SharedPipeline = Arc<Pipeline>;

impl Pipeline {
    /// Validate `definition` and bind it to the tools and backend.
    pub fn new(
        definition: PipelineDefinition,
        tools: &ToolRegistry,
        backend: SharedBackend,
        config: ReasoningConfig,
    ) -> Result<Self, PipelineError> {
        definition.validate()?;

        let mut steps = Vec::with_capacity(definition.steps.len());
        for (position, step) in definition.steps.into_iter().enumerate() {
            let label = step.label(position);
            let required = step.required_tools();
            if let Some(missing) = required.iter().find(|name| !tools.contains(name)) {
                return Err(PipelineError::InvalidPipeline(format!(
                    "Step '{}' uses tool '{}' which is not registered",
                    label, missing
                )));
            }
            let step_tools = tools.filtered_by_names(&required);
            steps.push(PlannedStep {
                label,
                definition: step,
                tools: step_tools,
            });
        }

        tracing::info!(
            pipeline = %definition.name,
            steps = steps.len(),
            backend = backend.name(),
            "Pipeline built"
        );

        Ok(Self {
            name: definition.name,
            steps,
            reasoner: ReasoningStep::new(backend, config),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step labels in execution order.
    pub fn step_labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }

    /// Run every step in order. The first failure halts the run.
    pub async fn run(
        &self,
        argument: impl Into<String>,
    ) -> Result<RunResult, PipelineExecutionError> {
        let mut run = PipelineRun::new(argument);
        let started = Instant::now();

        tracing::info!(
            run_id = %run.run_id,
            pipeline = %self.name,
            argument = %run.argument,
            "Pipeline run started"
        );

        for (position, step) in self.steps.iter().enumerate() {
            let step_started = Instant::now();
            tracing::info!(run_id = %run.run_id, step = %step.label, position, "Step started");

            let output = match self.execute_step(step, &run).await {
                Ok(output) => output,
                Err(cause) => {
                    tracing::error!(
                        run_id = %run.run_id,
                        step = %step.label,
                        position,
                        error = %cause,
                        "Step failed, halting run"
                    );
                    return Err(PipelineExecutionError {
                        step_id: step.label.clone(),
                        position,
                        cause,
                    });
                }
            };

            tracing::info!(
                run_id = %run.run_id,
                step = %step.label,
                output = output.kind(),
                duration_ms = step_started.elapsed().as_millis() as u64,
                "Step completed"
            );
            run.record(step.definition.id.clone(), output);
        }

        tracing::info!(
            run_id = %run.run_id,
            pipeline = %self.name,
            duration_ms = started.elapsed().as_millis() as u64,
            "Pipeline run completed"
        );
        Ok(run.into_result())
    }

    async fn execute_step(
        &self,
        step: &PlannedStep,
        run: &PipelineRun,
    ) -> Result<StepOutput, StepError> {
        let resolver =
            ContextResolver::new(&run.argument, run.outputs()).with_memory(run.memory());
        let ctx = ToolContext::new(run.run_id, &step.label, run.memory().clone());

        match &step.definition.kind {
            StepKind::Reasoning(def) => {
                let instruction = resolver.render_str(&def.instruction)?;
                let fallback = def.fallback.as_deref().map(|template| DeferredFallback {
                    template,
                    resolver: &resolver,
                });

                let task = ReasoningTask {
                    instruction: &instruction,
                    rules: &def.rules,
                    tools: &step.tools,
                    format: def.format,
                    fallback: fallback.as_ref().map(|f| f as &dyn Fallback),
                };
                let outcome = self.reasoner.execute(task, &ctx).await?;
                if outcome.used_fallback {
                    tracing::warn!(
                        run_id = %run.run_id,
                        step = %step.label,
                        answer = %outcome.text,
                        "Step answered with its fallback"
                    );
                }
                Ok(StepOutput::text(outcome.text))
            }
            StepKind::Effect(action) => {
                effect::execute(action, run.last(), &resolver, &step.tools, &ctx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{EffectAction, ReasoningDefinition};
    use leadline_agent::{MockTool, OutputFormat, Rule, StepExecutionError};
    use leadline_llm::{CompletionResponse, MockBackend};
    use serde_json::json;

    fn tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(MockTool::new("speech_synthesis").with_response(json!({
            "artifact_id": "audio-1",
            "path": "/tmp/audio-1.mp3",
            "media_type": "audio/mpeg"
        })));
        tools
    }

    #[test]
    fn test_unregistered_tool_rejected() {
        let def = PipelineDefinition::new("p").step(StepDefinition::reasoning(
            ReasoningDefinition::new("Find it").tool("web_scrape"),
        ));
        let err = Pipeline::new(
            def,
            &tools(),
            Arc::new(MockBackend::new(vec![])),
            ReasoningConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'web_scrape' which is not registered"));
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let def = PipelineDefinition::new("p").step(StepDefinition::reasoning(
            ReasoningDefinition::new("{{ later.output }}"),
        ));
        assert!(matches!(
            Pipeline::new(
                def,
                &tools(),
                Arc::new(MockBackend::new(vec![])),
                ReasoningConfig::default()
            ),
            Err(PipelineError::UnresolvedReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_reasoning_then_effect() {
        let def = PipelineDefinition::new("p")
            .step(
                StepDefinition::reasoning(ReasoningDefinition::new("Describe {{ input }}"))
                    .with_id("describe"),
            )
            .step(StepDefinition::effect(EffectAction::Synthesize { voice: None }));
        let backend = Arc::new(MockBackend::with_text("A small company."));
        let pipeline =
            Pipeline::new(def, &tools(), backend.clone(), ReasoningConfig::default()).unwrap();

        assert_eq!(pipeline.step_labels(), vec!["describe", "#1"]);

        let result = pipeline.run("a@b.com").await.unwrap();
        assert_eq!(result.argument, "a@b.com");
        assert_eq!(
            result.output("describe"),
            Some(&StepOutput::text("A small company."))
        );
        assert_eq!(result.outputs[1].output.render(), "audio-1");

        let requests = backend.requests();
        assert_eq!(requests[0].messages[0].content.to_text(), "Describe a@b.com");
    }

    fn memory_fallback_pipeline(tools: &ToolRegistry, backend: Arc<MockBackend>) -> Pipeline {
        let def = PipelineDefinition::new("p").step(
            StepDefinition::reasoning(
                ReasoningDefinition::new("Find the LinkedIn URL for {{ args[0] }}")
                    .rule(Rule::best_guess("Guess if needed."))
                    .tool("web_scrape")
                    .format(OutputFormat::Url)
                    .fallback("{{ memory.web_scrape }}"),
            )
            .with_id("linkedin_url"),
        );
        Pipeline::new(def, tools, backend, ReasoningConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_memory_fallback_not_rendered_for_valid_answer() {
        let mut tools = tools();
        tools.register(MockTool::new("web_scrape"));
        let backend = Arc::new(MockBackend::with_text("https://www.linkedin.com/company/b"));

        let result = memory_fallback_pipeline(&tools, backend)
            .run("a@b.com")
            .await
            .unwrap();
        assert_eq!(
            result.output("linkedin_url").unwrap().render(),
            "https://www.linkedin.com/company/b"
        );
    }

    #[tokio::test]
    async fn test_memory_fallback_reads_this_steps_tool_output() {
        let mut tools = tools();
        tools.register(
            MockTool::new("web_scrape")
                .off_prompt()
                .with_response(json!("https://www.linkedin.com/company/b")),
        );
        let backend = Arc::new(MockBackend::new(vec![
            CompletionResponse::tool_call("m1", "t1", "web_scrape", json!({"url": "b.com"})),
            CompletionResponse::text_only("m2", "No idea."),
            CompletionResponse::text_only("m3", "Still no idea."),
        ]));

        let result = memory_fallback_pipeline(&tools, backend)
            .run("a@b.com")
            .await
            .unwrap();
        assert_eq!(
            result.output("linkedin_url").unwrap().render(),
            "https://www.linkedin.com/company/b"
        );
    }

    #[tokio::test]
    async fn test_unrenderable_fallback_fails_step() {
        let mut tools = tools();
        tools.register(MockTool::new("web_scrape"));
        let backend = Arc::new(MockBackend::new(vec![
            CompletionResponse::text_only("m1", "No idea."),
            CompletionResponse::text_only("m2", "Still no idea."),
        ]));

        let err = memory_fallback_pipeline(&tools, backend)
            .run("a@b.com")
            .await
            .unwrap_err();
        assert_eq!(err.step_id, "linkedin_url");
        assert!(matches!(
            err.cause,
            StepError::Execution(StepExecutionError::Fallback(_))
        ));
    }

    #[tokio::test]
    async fn test_runs_get_distinct_ids() {
        let def = PipelineDefinition::new("p").step(StepDefinition::reasoning(
            ReasoningDefinition::new("Say hi"),
        ));
        let backend = Arc::new(MockBackend::new(vec![
            CompletionResponse::text_only("1", "hi"),
            CompletionResponse::text_only("2", "hi"),
        ]));
        let pipeline = Pipeline::new(def, &tools(), backend, ReasoningConfig::default()).unwrap();

        let first = pipeline.run("x").await.unwrap();
        let second = pipeline.run("x").await.unwrap();
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.ordered_outputs(), second.ordered_outputs());
    }
}
