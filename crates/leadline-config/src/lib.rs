//! Configuration system for Leadline.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (XDG user config + project-local overrides)
//! - Sections for the LLM, the HTTP server, checkout and each tool
//! - Secret resolution (env var → config file, with a plaintext warning)
//! - Environment overrides for the deployment-specific settings

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    load_explicit, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ResolvedSecret, Secret, SecretSource, resolve_secret, resolve_secret_with};
pub use types::*;
