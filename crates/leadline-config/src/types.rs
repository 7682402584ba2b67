//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [llm]                    # Anthropic backend and reasoning limits
//! [server]                 # HTTP listener
//! [checkout]               # Stripe checkout session settings
//! [tools.web_scrape]       # one section per tool
//! [tools.company_lookup]
//! [tools.speech]
//! [tools.playback]
//! [tools.message_post]
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secrets::Secret;

/// Built-in defaults.
pub mod defaults {
    pub const DEFAULT_PORT: u16 = 8000;
    pub const DEFAULT_BIND: &str = "127.0.0.1";
    pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
    pub const WEB_SCRAPE_TIMEOUT_MS: u64 = 1000;
    pub const ARTIFACT_DIR: &str = "leadline-audio";
}

/// Placeholder shown instead of secret values.
pub const REDACTED: &str = "********";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadlineConfig {
    /// LLM backend configuration.
    pub llm: Option<LlmConfig>,

    /// Server configuration.
    pub server: Option<ServerConfig>,

    /// Checkout session configuration.
    pub checkout: Option<CheckoutConfig>,

    /// Per-tool configuration.
    pub tools: ToolsConfig,
}

impl LeadlineConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: LeadlineConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }

        if other.server.is_some() {
            self.server = other.server;
        }

        if other.checkout.is_some() {
            self.checkout = other.checkout;
        }

        self.tools.merge(other.tools);
    }

    /// Apply the non-secret environment overrides.
    ///
    /// `STRIPE_PRICE_ID` and `RETURN_TO_URL` fill `[checkout]`,
    /// `ZAPIER_WEBHOOK_URL` fills `[tools.message_post]`. Returns the names of
    /// the variables that were applied.
    pub fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Vec<&'static str> {
        let mut applied = Vec::new();
        let mut get = |var: &'static str| {
            let value = env(var).filter(|v| !v.is_empty());
            if value.is_some() {
                applied.push(var);
            }
            value
        };

        if let Some(price_id) = get("STRIPE_PRICE_ID") {
            self.checkout.get_or_insert_with(Default::default).price_id = Some(price_id);
        }
        if let Some(return_url) = get("RETURN_TO_URL") {
            self.checkout.get_or_insert_with(Default::default).return_url = Some(return_url);
        }
        if let Some(endpoint) = get("ZAPIER_WEBHOOK_URL") {
            self.tools
                .message_post
                .get_or_insert_with(Default::default)
                .endpoint = Some(endpoint);
        }
        applied
    }

    /// Copy of the config with every secret replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        let redact = |value: &mut Option<String>| {
            if value.is_some() {
                *value = Some(REDACTED.to_string());
            }
        };
        if let Some(ref mut llm) = config.llm {
            redact(&mut llm.api_key);
        }
        if let Some(ref mut checkout) = config.checkout {
            redact(&mut checkout.api_key);
        }
        if let Some(ref mut lookup) = config.tools.company_lookup {
            redact(&mut lookup.api_key);
        }
        if let Some(ref mut speech) = config.tools.speech {
            redact(&mut speech.api_key);
        }
        config
    }

    /// Secrets stored in plaintext in this config.
    pub fn plaintext_secrets(&self) -> Vec<Secret> {
        Secret::ALL
            .into_iter()
            .filter(|s| s.config_value(self).is_some())
            .collect()
    }

    /// The effective server settings.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// The effective LLM settings.
    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the LLM backend and the reasoning loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier.
    pub model: Option<String>,
    /// Custom API base URL (for proxies, custom endpoints).
    pub base_url: Option<String>,
    /// API key (prefer env var; warns if set here).
    pub api_key: Option<String>,
    /// Maximum tokens per completion.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Reasoning iterations per step before giving up.
    pub max_iterations: Option<u32>,
    /// Retries of timed-out tool calls within a step.
    pub tool_retries: Option<u32>,
    /// Maximum retry attempts for failed requests.
    pub retry_max: Option<u32>,
    /// Backoff delay between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::DEFAULT_PORT,
            bind: defaults::DEFAULT_BIND.to_string(),
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Checkout Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Payment checkout settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Stripe secret key (prefer `STRIPE_API_KEY`).
    pub api_key: Option<String>,
    /// Price of the single line item.
    pub price_id: Option<String>,
    /// Success and cancel URL.
    pub return_url: Option<String>,
    /// Stripe API base URL.
    pub base_url: Option<String>,
}

impl CheckoutConfig {
    pub fn require_price_id(&self) -> crate::Result<&str> {
        self.price_id
            .as_deref()
            .ok_or_else(|| crate::ConfigError::missing("price_id", "[checkout] (or STRIPE_PRICE_ID)"))
    }

    pub fn require_return_url(&self) -> crate::Result<&str> {
        self.return_url.as_deref().ok_or_else(|| {
            crate::ConfigError::missing("return_url", "[checkout] (or RETURN_TO_URL)")
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(defaults::STRIPE_API_BASE)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Per-tool sections under `[tools]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub web_scrape: Option<WebScrapeToolConfig>,
    pub company_lookup: Option<CompanyLookupToolConfig>,
    pub speech: Option<SpeechToolConfig>,
    pub playback: Option<PlaybackToolConfig>,
    pub message_post: Option<MessagePostToolConfig>,
}

impl ToolsConfig {
    /// Merge per tool section (other takes priority).
    pub fn merge(&mut self, other: ToolsConfig) {
        if other.web_scrape.is_some() {
            self.web_scrape = other.web_scrape;
        }
        if other.company_lookup.is_some() {
            self.company_lookup = other.company_lookup;
        }
        if other.speech.is_some() {
            self.speech = other.speech;
        }
        if other.playback.is_some() {
            self.playback = other.playback;
        }
        if other.message_post.is_some() {
            self.message_post = other.message_post;
        }
    }
}

/// `[tools.web_scrape]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebScrapeToolConfig {
    pub timeout_ms: u64,
    pub off_prompt: bool,
}

impl Default for WebScrapeToolConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::WEB_SCRAPE_TIMEOUT_MS,
            off_prompt: true,
        }
    }
}

/// `[tools.company_lookup]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyLookupToolConfig {
    /// Proxycurl key (prefer `PROXYCURL_API_KEY`).
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Operations the model may request.
    pub allowlist: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub off_prompt: bool,
}

impl Default for CompanyLookupToolConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            allowlist: vec!["get_company".to_string()],
            timeout_secs: None,
            off_prompt: true,
        }
    }
}

/// `[tools.speech]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechToolConfig {
    /// ElevenLabs key (prefer `ELEVEN_LABS_API_KEY`).
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model_id: Option<String>,
    /// Voice name or id.
    pub voice: Option<String>,
    /// Where audio artifacts are written.
    pub output_dir: Option<PathBuf>,
}

impl SpeechToolConfig {
    /// Artifact directory, defaulting to one under the system temp dir.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(defaults::ARTIFACT_DIR))
    }
}

/// `[tools.playback]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackToolConfig {
    /// Player executable.
    pub program: Option<String>,
    /// Arguments placed before the file path.
    pub args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

/// `[tools.message_post]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePostToolConfig {
    /// Webhook endpoint (or `ZAPIER_WEBHOOK_URL`).
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl MessagePostToolConfig {
    pub fn require_endpoint(&self) -> crate::Result<&str> {
        self.endpoint.as_deref().ok_or_else(|| {
            crate::ConfigError::missing("endpoint", "[tools.message_post] (or ZAPIER_WEBHOOK_URL)")
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
