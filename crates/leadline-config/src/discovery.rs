//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/leadline/config.toml` (XDG user config)
//! 2. `./leadline.toml` (project-local)
//! 3. Environment overrides (`STRIPE_PRICE_ID`, `RETURN_TO_URL`, `ZAPIER_WEBHOOK_URL`)
//!
//! An explicit `--config` path replaces steps 1 and 2.

use std::path::{Path, PathBuf};

use crate::{ConfigError, LeadlineConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "leadline.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "leadline";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "LEADLINE_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: LeadlineConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Environment overrides that were applied.
    pub env_overrides: Vec<&'static str>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, |var| std::env::var(var).ok())
}

/// Load configuration with explicit control over the user config directory
/// and the environment.
///
/// `config_dir` overrides both `LEADLINE_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let mut config = LeadlineConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit override, then env var, then platform default
    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path_with(&env),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    Ok(finish(config, sources, warnings, env))
}

/// Load a single explicit config file, then apply environment overrides.
///
/// Unlike discovery, a missing or invalid explicit file is an error.
pub fn load_explicit(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    let sources = vec![ConfigSource {
        path: path.to_path_buf(),
        loaded: true,
    }];
    Ok(finish(config, sources, Vec::new(), env))
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<LeadlineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    LeadlineConfig::from_toml(&contents)
}

/// Get the XDG config file path for leadline.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for leadline.
///
/// Checks `LEADLINE_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    xdg_config_dir_with(&|var: &str| std::env::var(var).ok())
}

fn xdg_config_dir_with(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(dir) = env(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

fn xdg_config_path_with(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    xdg_config_dir_with(env).map(|d| d.join(USER_CONFIG_FILE))
}

fn finish(
    mut config: LeadlineConfig,
    sources: Vec<ConfigSource>,
    mut warnings: Vec<String>,
    env: impl Fn(&str) -> Option<String>,
) -> LoadedConfig {
    check_plaintext_secrets(&config, &mut warnings);
    let env_overrides = config.apply_env_overrides(env);
    LoadedConfig {
        config,
        sources,
        env_overrides,
        warnings,
    }
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut LeadlineConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

/// Check for plaintext secrets in the config and emit warnings.
fn check_plaintext_secrets(config: &LeadlineConfig, warnings: &mut Vec<String>) {
    for secret in config.plaintext_secrets() {
        warnings.push(format!(
            "{} contains a plaintext {}. Consider using the {} environment variable instead.",
            secret.config_section(),
            secret.display_name(),
            secret.env_var()
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_xdg_config_dir_env_override() {
        let dir = xdg_config_dir_with(&|var: &str| {
            (var == CONFIG_DIR_ENV).then(|| "/custom/leadline".to_string())
        });
        assert_eq!(dir, Some(PathBuf::from("/custom/leadline")));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_project_overrides_user() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[server]
port = 9090

[checkout]
price_id = "price_user"
"#,
        )
        .unwrap();
        fs::write(
            project_dir.path().join("leadline.toml"),
            r#"
[server]
port = 9191
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path()), no_env)
                .unwrap();

        assert_eq!(loaded.config.server().port, 9191);
        assert_eq!(
            loaded.config.checkout.as_ref().unwrap().price_id.as_deref(),
            Some("price_user")
        );
        assert_eq!(loaded.loaded_from().len(), 2);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path()), no_env)
                .unwrap();
        assert!(loaded.config.llm.is_none());
        assert!(loaded.loaded_from().is_empty());
        assert_eq!(loaded.sources.len(), 2);
    }

    #[test]
    fn test_invalid_layer_becomes_warning() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(dir.path().join("leadline.toml"), "[server\nport = 1").unwrap();

        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path()), no_env)
                .unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].starts_with("Failed to load"));
    }

    #[test]
    fn test_plaintext_secret_warning_and_env_overrides() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("leadline.toml"),
            r#"
[llm]
api_key = "sk-ant-plain"
"#,
        )
        .unwrap();

        let loaded = load_config_with_options(
            Some(dir.path()),
            Some(empty_config_dir.path()),
            |var: &str| (var == "RETURN_TO_URL").then(|| "https://example.com/done".to_string()),
        )
        .unwrap();

        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("ANTHROPIC_API_KEY"));
        assert_eq!(loaded.env_overrides, vec!["RETURN_TO_URL"]);
        assert_eq!(
            loaded
                .config
                .checkout
                .as_ref()
                .unwrap()
                .require_return_url()
                .unwrap(),
            "https://example.com/done"
        );
    }

    #[test]
    fn test_load_explicit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[server]\nport = 8123\n").unwrap();

        let loaded = load_explicit(&path, no_env).unwrap();
        assert_eq!(loaded.config.server().port, 8123);
        assert_eq!(loaded.loaded_from(), vec![path.as_path()]);

        assert!(load_explicit(&dir.path().join("missing.toml"), no_env).is_err());
    }
}
