//! Run command - one synchronous pipeline run.

use anyhow::Result;
use clap::Args;

use super::Context;
use crate::wiring;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Customer email address
    pub email: String,

    /// Print the full run result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let env = |var: &str| std::env::var(var).ok();
    let pipeline = wiring::build_pipeline(&loaded.config, &env)?;

    let result = pipeline.run(args.email).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for recorded in &result.outputs {
        let label = recorded
            .step_id
            .clone()
            .unwrap_or_else(|| format!("#{}", recorded.position));
        println!("{:<14} {}", label, recorded.output);
    }
    if ctx.verbose {
        println!("run {}", result.run_id);
    }
    Ok(())
}
