//! CLI integration tests for the Leadline command-line interface.
//!
//! These cover help output, argument parsing and the `config` command.
//! Nothing here talks to the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the leadline binary with a clean environment.
fn leadline(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("leadline").unwrap();
    cmd.env("LEADLINE_CONFIG_DIR", config_dir.path())
        .env_remove("LEADLINE_CONFIG")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("STRIPE_API_KEY")
        .env_remove("PROXYCURL_API_KEY")
        .env_remove("ELEVEN_LABS_API_KEY")
        .env_remove("STRIPE_PRICE_ID")
        .env_remove("RETURN_TO_URL")
        .env_remove("ZAPIER_WEBHOOK_URL")
        .current_dir(config_dir.path());
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    leadline(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    leadline(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("leadline"));
}

#[test]
fn test_run_requires_email() {
    let dir = TempDir::new().unwrap();
    leadline(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<EMAIL>"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = TempDir::new().unwrap();
    leadline(&dir).arg("enrich").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_redacts_secrets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(
        &path,
        r#"
[llm]
api_key = "sk-ant-very-secret"
model = "claude-3-opus-20240229"

[checkout]
price_id = "price_123"
"#,
    )
    .unwrap();

    leadline(&dir)
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("price_123"))
        .stdout(predicate::str::contains("claude-3-opus-20240229"))
        .stdout(predicate::str::contains("sk-ant-very-secret").not())
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}

#[test]
fn test_config_applies_env_overrides() {
    let dir = TempDir::new().unwrap();
    leadline(&dir)
        .env("ZAPIER_WEBHOOK_URL", "https://hooks.example.com/catch/1")
        .args(["config", "--sources"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# env ZAPIER_WEBHOOK_URL"))
        .stdout(predicate::str::contains("https://hooks.example.com/catch/1"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    leadline(&dir)
        .args(["--config", "does-not-exist.toml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

#[test]
fn test_run_without_api_key_fails() {
    let dir = TempDir::new().unwrap();
    leadline(&dir)
        .args(["run", "a@b.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}
