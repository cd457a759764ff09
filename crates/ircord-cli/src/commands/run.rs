//! `ircord run` -- start the bridge.
//!
//! # Lifecycle
//!
//! ```text
//! 1. Load and validate config
//! 2. Build the shared Bridge (channel map, correlation store, roster)
//! 3. Spawn the IRC client loop and the Discord gateway loop
//! 4. Wait for Ctrl+C (or a loop giving up), cancel both loops, wait for
//!    them to finish
//! ```
//!
//! # Example
//!
//! ```text
//! ircord run
//! ircord run --config /etc/ircord.yaml
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ircord_bridge::{Bridge, DiscordApiClient, DiscordGateway, IrcClient, IrcLink};

use super::load_config;

/// Arguments for the `ircord run` subcommand.
#[derive(Args)]
pub struct RunArgs {
    /// Config file path (default: `config.yaml`).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let token = config
        .discord
        .resolve_token()
        .context("Discord token is empty; set discord.token or the variable named by discord.token_env")?;

    let link = Arc::new(IrcLink::new());
    let api = Arc::new(DiscordApiClient::new(token.expose().to_owned()));
    let bridge = Arc::new(Bridge::new(&config, link.clone(), api)?);
    info!(
        channels = bridge.channels().len(),
        server = %config.irc.server,
        nick = %config.irc.nickname,
        "bridge starting"
    );

    let irc = IrcClient::new(config.irc.clone(), link, bridge.clone());
    let gateway = DiscordGateway::new(config.discord.clone(), token, bridge);

    let cancel = CancellationToken::new();
    // A loop that gives up (rejected credentials) stops the other one too.
    let irc_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let result = irc.run(cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        }
    });
    let discord_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let result = gateway.run(cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        }
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("received Ctrl+C, shutting down");
        }
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();

    let (irc_result, discord_result) = tokio::join!(irc_task, discord_task);
    irc_result??;
    discord_result??;

    info!("bridge stopped");
    Ok(())
}
