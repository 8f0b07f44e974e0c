//! Command-line interface for relaywatch.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Poll sensors and print readings and alerts |
//! | `history` | Show a controller's readings over a time window |
//! | `relay` | Flip a relay, after confirmation |
//! | `mode` | Switch a controller between manual and automatic |
//! | `status` | Signed-in user, controllers and relays |
//! | `config` | Show, locate or create the config file |

mod cli;
mod commands;
mod config;
mod style;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use time::UtcOffset;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{
    HistoryArgs, WatchArgs, cmd_config, cmd_history, cmd_mode, cmd_relay, cmd_status, cmd_watch,
};
use crate::config::{Config, default_config_path};
use crate::util::connect;

fn main() -> Result<()> {
    // The local offset can only be read soundly while the process is single-threaded.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(run(cli, offset))
}

async fn run(cli: Cli, offset: UtcOffset) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    // `config init` must work even when the existing file is broken.
    if let Commands::Config { action } = cli.command {
        let config = Config::load_validated(&config_path).unwrap_or_default();
        return cmd_config(action, &config, &config_path, cli.no_color);
    }

    let config = if config_path.exists() {
        Config::load_validated(&config_path)?
    } else {
        tracing::debug!("No config at {}, using defaults", config_path.display());
        Config::default()
    };
    let api = connect(&cli.api, &config)?;

    let result = match cli.command {
        Commands::Watch {
            controller,
            count,
            format,
        } => {
            cmd_watch(
                api,
                WatchArgs {
                    controller,
                    count,
                    format,
                    config: &config,
                    offset,
                    no_color: cli.no_color,
                    quiet: cli.quiet,
                },
            )
            .await
        }
        Commands::History {
            controller,
            preset,
            from,
            to,
            ticks,
            format,
        } => {
            cmd_history(
                api,
                HistoryArgs {
                    controller,
                    preset,
                    from,
                    to,
                    ticks,
                    format,
                    config: &config,
                    offset,
                    no_color: cli.no_color,
                },
            )
            .await
        }
        Commands::Relay { relay, yes } => cmd_relay(api, relay, yes, cli.no_color).await,
        Commands::Mode { controller, yes } => cmd_mode(api, controller, yes, cli.no_color).await,
        Commands::Status { format } => cmd_status(api, format, cli.no_color).await,
        Commands::Config { .. } => unreachable!("handled above"),
    };

    result.map_err(explain_auth_failure)
}

/// Add a sign-in hint to errors caused by missing or expired credentials.
fn explain_auth_failure(err: anyhow::Error) -> anyhow::Error {
    let is_auth = err
        .downcast_ref::<relaywatch_core::Error>()
        .is_some_and(relaywatch_core::Error::is_auth_failure);
    if is_auth {
        err.context("Not signed in. Set RELAYWATCH_TOKEN or api.token in the config file")
    } else {
        err
    }
}
