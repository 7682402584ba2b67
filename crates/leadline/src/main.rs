//! Leadline - enrich paying customers and announce them to the team
//!
//! Main entry point for the Leadline CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod wiring;

use commands::{config, run, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Leadline - enrich paying customers and announce them to the team
#[derive(Parser)]
#[command(name = "leadline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (overrides default discovery)
    #[arg(long, global = true, env = "LEADLINE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook server
    Start(start::StartArgs),

    /// Run the enrichment pipeline once for an email address
    Run(run::RunArgs),

    /// Print the resolved configuration with secrets redacted
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "leadline=debug,leadline_agent=debug,leadline_llm=debug,leadline_pipeline=debug,leadline_server=debug,leadline_config=debug,info"
    } else {
        "leadline=info,leadline_agent=info,leadline_llm=info,leadline_pipeline=info,leadline_server=info,warn"
    };

    let log_dir = leadline_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "leadline.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "leadline=trace,leadline_agent=trace,leadline_llm=trace,leadline_pipeline=trace,leadline_server=trace,leadline_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
