//! Start command - launches the webhook server.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context as _, Result};
use clap::Args;
use leadline_server::{AppState, Server, ServerConfig};

use super::Context;
use crate::wiring;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let env = |var: &str| std::env::var(var).ok();

    let mut server_config = ServerConfig::from_settings(&config.server())?;
    if let Some(ref bind) = args.bind {
        let ip: IpAddr = bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", bind))?;
        server_config.bind_address = SocketAddr::new(ip, server_config.bind_address.port());
    }
    if let Some(port) = args.port {
        server_config.bind_address.set_port(port);
    }

    let pipeline = wiring::build_pipeline(config, &env)?;
    let mut state = AppState::new(pipeline, server_config);
    match wiring::build_checkout(config, &env)? {
        Some(checkout) => state = state.with_checkout(checkout),
        None => {
            tracing::warn!("No [checkout] configured, /stripe-checkout will return 500");
        }
    }

    let server = Server::from_state(state);
    println!("Leadline listening on http://{}", server.bind_address());
    server.run().await?;
    Ok(())
}
