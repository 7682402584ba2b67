//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field.
    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// Secret not found through any resolution method.
    #[error("{name} not found. Set env var {env_var} or add it to the config file")]
    SecretNotFound { name: String, env_var: String },
}

impl ConfigError {
    pub fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }
}
