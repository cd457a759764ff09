//! `ircord check` -- validate the configuration.
//!
//! Loads and validates the config file, then prints the bridged channels
//! and whether the credentials it refers to are available.
//!
//! # Example
//!
//! ```text
//! ircord check --config /etc/ircord.yaml
//! ```

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};

use ircord_types::config::BridgeConfig;

use super::load_config;

/// Arguments for the `ircord check` subcommand.
#[derive(Args)]
pub struct CheckArgs {
    /// Config file path (default: `config.yaml`).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    println!("{}", summary(&config));
    println!("{}", channel_table(&config));
    Ok(())
}

fn summary(config: &BridgeConfig) -> String {
    let token = if config.discord.resolve_token().is_some() {
        "present"
    } else {
        "MISSING"
    };
    let mut out = format!(
        "irc: {}:{} (tls: {}) as {}\ndiscord token: {token}",
        config.irc.server, config.irc.port, config.irc.use_tls, config.irc.nickname
    );
    if config.irc.auth_method == "nickserv" {
        let password = if config.irc.password().is_some() {
            "present"
        } else {
            "MISSING"
        };
        out.push_str(&format!("\nnickserv password: {password}"));
    }
    out
}

fn channel_table(config: &BridgeConfig) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["DISCORD CHANNEL", "IRC CHANNEL"]);
    for (discord_id, irc_name) in &config.channels {
        table.add_row([discord_id.as_str(), irc_name.as_str()]);
    }
    table
}
