//! Config command - print the resolved configuration.

use anyhow::Result;
use clap::Args;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also list the config files and env overrides that were applied
    #[arg(long)]
    pub sources: bool,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    if args.sources {
        for source in &loaded.sources {
            let status = if source.loaded { "loaded" } else { "not found" };
            println!("# {} ({})", source.path.display(), status);
        }
        for var in &loaded.env_overrides {
            println!("# env {}", var);
        }
        println!();
    }

    print!("{}", loaded.config.redacted().to_toml()?);
    Ok(())
}
