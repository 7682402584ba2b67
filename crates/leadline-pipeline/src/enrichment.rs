//! The payment-triggered enrichment pipeline.

use leadline_agent::{OutputFormat, ReasoningConfig, Rule, ToolRegistry};
use leadline_llm::SharedBackend;
use serde_json::json;

use crate::definition::{EffectAction, PipelineDefinition, ReasoningDefinition, StepDefinition};
use crate::engine::Pipeline;
use crate::error::PipelineError;

pub const PIPELINE_NAME: &str = "enrichment";

pub const LINKEDIN_URL_STEP: &str = "linkedin_url";
pub const SUMMARY_STEP: &str = "summary";
pub const AUDIO_STEP: &str = "audio";
pub const PLAYBACK_STEP: &str = "playback";
pub const NOTIFY_STEP: &str = "notify";

/// Best guess built from the email domain alone.
pub const LINKEDIN_FALLBACK: &str =
    "https://www.linkedin.com/company/{{ args[0] | email_domain | domain_stem }}";

/// Tools the enrichment pipeline expects in the registry.
pub const REQUIRED_TOOLS: &[&str] = &[
    "web_scrape",
    "company_lookup",
    "memory_query",
    "speech_synthesis",
    "audio_playback",
    "message_post",
];

/// Email → company LinkedIn URL → summary → speech → playback → chat.
pub fn enrichment_definition() -> PipelineDefinition {
    PipelineDefinition::new(PIPELINE_NAME)
        .step(
            StepDefinition::reasoning(
                ReasoningDefinition::new(
                    "Use this email address to scrape their company's website for their \
                     LinkedIn URL: {{ args[0] }}.",
                )
                .rule(Rule::new(
                    "Output your answer as just the url, no extra words or formatting.",
                ))
                .rule(Rule::best_guess(
                    "If you can't find it, make a best educated guess.",
                ))
                .rule(Rule::new("Find the company's LinkedIn URL, not the person's."))
                .tool("web_scrape")
                .tool("memory_query")
                .format(OutputFormat::Url)
                .fallback(LINKEDIN_FALLBACK),
            )
            .with_id(LINKEDIN_URL_STEP),
        )
        .step(
            StepDefinition::reasoning(
                ReasoningDefinition::new(
                    "Get information on this company from their LinkedIn URL, then write a \
                     summary on the company using this information. LinkedIn URL: \
                     {{ parent.output }}.",
                )
                .rule(Rule::new(
                    "Keep your summary to under 2 sentences. Include the company's industry, \
                     size, and any other relevant information.",
                ))
                .tool("company_lookup")
                .tool("memory_query"),
            )
            .with_id(SUMMARY_STEP),
        )
        .step(StepDefinition::effect(EffectAction::Synthesize { voice: None }).with_id(AUDIO_STEP))
        .step(StepDefinition::effect(EffectAction::Play).with_id(PLAYBACK_STEP))
        .step(
            StepDefinition::effect(EffectAction::Deliver {
                payload: json!({
                    "email": "{{ args[0] }}",
                    "summary": "{{ summary.output }}",
                    "url": "{{ linkedin_url.output }}",
                }),
            })
            .with_id(NOTIFY_STEP),
        )
}

/// Build the enrichment pipeline over the given tools and backend.
pub fn enrichment_pipeline(
    tools: &ToolRegistry,
    backend: SharedBackend,
    config: ReasoningConfig,
) -> Result<Pipeline, PipelineError> {
    Pipeline::new(enrichment_definition(), tools, backend, config)
}
