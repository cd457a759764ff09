//! `ircord` -- CLI binary for the IRC/Discord bridge.
//!
//! Provides the following subcommands:
//!
//! - `ircord run` -- Connect to both networks and relay until Ctrl+C.
//! - `ircord check` -- Validate the configuration and show the channel map.

use clap::{Parser, Subcommand};

mod commands;

/// IRC/Discord bridge.
#[derive(Parser)]
#[command(name = "ircord", about = "IRC/Discord bridge", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Connect to IRC and Discord and relay messages.
    Run(commands::run::RunArgs),

    /// Validate the configuration file.
    Check(commands::check::CheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::Check(args) => commands::check::run(args)?,
    }

    Ok(())
}
