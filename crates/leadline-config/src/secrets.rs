//! Secret resolution.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Config file (with warning)

use crate::{ConfigError, LeadlineConfig, Result};

/// Credentials the system needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Secret {
    Anthropic,
    Stripe,
    Proxycurl,
    ElevenLabs,
}

impl Secret {
    pub const ALL: [Secret; 4] = [
        Secret::Anthropic,
        Secret::Stripe,
        Secret::Proxycurl,
        Secret::ElevenLabs,
    ];

    /// Environment variable name for this secret.
    pub fn env_var(&self) -> &'static str {
        match self {
            Secret::Anthropic => "ANTHROPIC_API_KEY",
            Secret::Stripe => "STRIPE_API_KEY",
            Secret::Proxycurl => "PROXYCURL_API_KEY",
            Secret::ElevenLabs => "ELEVEN_LABS_API_KEY",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Secret::Anthropic => "Anthropic API key",
            Secret::Stripe => "Stripe API key",
            Secret::Proxycurl => "Proxycurl API key",
            Secret::ElevenLabs => "ElevenLabs API key",
        }
    }

    /// Config section that may hold the secret in plaintext.
    pub fn config_section(&self) -> &'static str {
        match self {
            Secret::Anthropic => "[llm]",
            Secret::Stripe => "[checkout]",
            Secret::Proxycurl => "[tools.company_lookup]",
            Secret::ElevenLabs => "[tools.speech]",
        }
    }

    /// The plaintext value from the config, if any.
    pub fn config_value<'a>(&self, config: &'a LeadlineConfig) -> Option<&'a str> {
        match self {
            Secret::Anthropic => config.llm.as_ref()?.api_key.as_deref(),
            Secret::Stripe => config.checkout.as_ref()?.api_key.as_deref(),
            Secret::Proxycurl => config.tools.company_lookup.as_ref()?.api_key.as_deref(),
            Secret::ElevenLabs => config.tools.speech.as_ref()?.api_key.as_deref(),
        }
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Result of secret resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve a secret from the process environment, then the config.
pub fn resolve_secret(secret: Secret, config: &LeadlineConfig) -> Result<ResolvedSecret> {
    resolve_secret_with(secret, config, |var| std::env::var(var).ok())
}

/// Resolve a secret with an explicit environment lookup.
pub fn resolve_secret_with(
    secret: Secret,
    config: &LeadlineConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedSecret> {
    let env_var = secret.env_var();
    if let Some(value) = env(env_var)
        && !value.is_empty()
    {
        return Ok(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    secret
        .config_value(config)
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
        .ok_or_else(|| ConfigError::SecretNotFound {
            name: secret.display_name().to_string(),
            env_var: env_var.to_string(),
        })
}
