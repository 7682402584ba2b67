//! CLI command handlers.

pub mod config;
pub mod run;
pub mod start;

use std::path::PathBuf;

use anyhow::Result;
use leadline_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, if given.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load configuration and report warnings on stderr.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = match &self.config_path {
            Some(path) => leadline_config::load_explicit(path, |var| std::env::var(var).ok())?,
            None => leadline_config::load_config(None)?,
        };

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }

        if self.verbose {
            let sources = loaded.loaded_from();
            if sources.is_empty() {
                eprintln!("No config files found, using defaults");
            } else {
                for source in sources {
                    eprintln!("Loaded config: {}", source.display());
                }
            }
            for var in &loaded.env_overrides {
                eprintln!("Override from env: {}", var);
            }
        }

        Ok(loaded)
    }
}
