//! Turns a loaded configuration into live components: the LLM backend, the
//! tool registry, the enrichment pipeline and the checkout provider.
//!
//! Every builder takes an explicit environment lookup so secrets can be
//! resolved without touching the process environment in tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use leadline_agent::{
    AudioPlaybackTool, CompanyLookupConfig, CompanyLookupTool, MemoryQueryTool,
    MessagePostConfig, MessagePostTool, PlaybackConfig, ReasoningConfig, SpeechConfig,
    SpeechSynthesisTool, ToolRegistry, WebScrapeConfig, WebScrapeTool,
};
use leadline_config::{LeadlineConfig, LlmConfig, Secret, resolve_secret_with};
use leadline_llm::{AnthropicBackend, AnthropicConfig, SharedBackend};
use leadline_pipeline::{Pipeline, enrichment_pipeline};
use leadline_server::{StripeCheckout, StripeCheckoutConfig};

/// Create the Anthropic backend from `[llm]`.
pub fn create_backend(
    config: &LeadlineConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<SharedBackend> {
    let llm = config.llm();
    let api_key = resolve_secret_with(Secret::Anthropic, config, env)?;

    let mut anthropic = AnthropicConfig::new(api_key.value);
    if let Some(ref url) = llm.base_url {
        anthropic = anthropic.with_base_url(url);
    }
    if let Some(retries) = llm.retry_max {
        anthropic = anthropic.with_max_retries(retries);
    }
    if let Some(ms) = llm.retry_backoff_ms {
        anthropic = anthropic.with_retry_backoff(Duration::from_millis(ms));
    }

    tracing::debug!(source = %api_key.source, "Resolved Anthropic API key");
    Ok(Arc::new(AnthropicBackend::new(anthropic)?))
}

/// Reasoning settings from `[llm]`, falling back to the built-in defaults.
pub fn reasoning_config(llm: &LlmConfig) -> ReasoningConfig {
    let defaults = ReasoningConfig::default();
    ReasoningConfig {
        model: llm.model.clone().unwrap_or(defaults.model),
        max_tokens: llm.max_tokens.unwrap_or(defaults.max_tokens),
        max_iterations: llm.max_iterations.unwrap_or(defaults.max_iterations),
        tool_retries: llm.tool_retries.unwrap_or(defaults.tool_retries),
        temperature: llm.temperature.or(defaults.temperature),
    }
}

/// Register every capability the enrichment pipeline uses.
pub fn build_tools(
    config: &LeadlineConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ToolRegistry> {
    let tools_config = &config.tools;
    let mut tools = ToolRegistry::new();

    // Discovery
    let web = tools_config.web_scrape.clone().unwrap_or_default();
    tools.register(WebScrapeTool::new(WebScrapeConfig {
        timeout: Duration::from_millis(web.timeout_ms),
        off_prompt: web.off_prompt,
        ..WebScrapeConfig::default()
    })?);

    let company = tools_config.company_lookup.clone().unwrap_or_default();
    let proxycurl_key = resolve_secret_with(Secret::Proxycurl, config, env)?;
    let mut lookup = CompanyLookupConfig::new(proxycurl_key.value);
    if let Some(url) = company.base_url {
        lookup = lookup.with_base_url(url);
    }
    if let Some(secs) = company.timeout_secs {
        lookup.timeout = Duration::from_secs(secs);
    }
    lookup.allowlist = company.allowlist;
    lookup.off_prompt = company.off_prompt;
    tools.register(CompanyLookupTool::new(lookup)?);

    tools.register(MemoryQueryTool::new());

    // Audio
    let speech = tools_config.speech.clone().unwrap_or_default();
    let eleven_labs_key = resolve_secret_with(Secret::ElevenLabs, config, env)?;
    let mut synthesis = SpeechConfig::new(eleven_labs_key.value, speech.output_dir());
    if let Some(ref url) = speech.base_url {
        synthesis = synthesis.with_base_url(url);
    }
    if let Some(model_id) = speech.model_id {
        synthesis.model_id = model_id;
    }
    if let Some(voice) = speech.voice {
        synthesis.voice = voice;
    }
    tools.register(SpeechSynthesisTool::new(synthesis)?);

    let playback = tools_config.playback.clone().unwrap_or_default();
    let mut player = PlaybackConfig::default();
    if let Some(program) = playback.program {
        player.program = program;
    }
    if let Some(args) = playback.args {
        player.args = args;
    }
    if let Some(secs) = playback.timeout_secs {
        player.timeout = Duration::from_secs(secs);
    }
    tools.register(AudioPlaybackTool::new(player));

    // Delivery
    let message = tools_config.message_post.clone().unwrap_or_default();
    let mut post = MessagePostConfig::new(message.require_endpoint()?);
    if let Some(secs) = message.timeout_secs {
        post.timeout = Duration::from_secs(secs);
    }
    tools.register(MessagePostTool::new(post)?);

    Ok(tools)
}

/// Build the enrichment pipeline with live collaborators.
pub fn build_pipeline(
    config: &LeadlineConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Pipeline> {
    let backend = create_backend(config, env)?;
    let tools = build_tools(config, env).context("Failed to set up tools")?;
    let pipeline = enrichment_pipeline(&tools, backend, reasoning_config(&config.llm()))?;
    Ok(pipeline)
}

/// Build the Stripe checkout client, if `[checkout]` is configured.
pub fn build_checkout(
    config: &LeadlineConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Option<StripeCheckout>> {
    let Some(checkout) = config.checkout.as_ref() else {
        return Ok(None);
    };

    let api_key = resolve_secret_with(Secret::Stripe, config, env)?;
    let stripe = StripeCheckoutConfig::new(
        api_key.value,
        checkout.require_price_id()?,
        checkout.require_return_url()?,
    )
    .with_base_url(checkout.base_url());
    Ok(Some(StripeCheckout::new(stripe)?))
}
