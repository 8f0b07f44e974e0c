//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use relaywatch_core::Preset;
use uuid::Uuid;

use crate::config::MAX_TICK_COUNT;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable service connection arguments
#[derive(Debug, Clone, Args)]
pub struct ApiArgs {
    /// Service URL, overrides the config file
    #[arg(long, global = true, env = "RELAYWATCH_URL")]
    pub url: Option<String>,

    /// Bearer token, overrides the config file
    #[arg(long, global = true, env = "RELAYWATCH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Parser)]
#[command(name = "relaywatch")]
#[command(author, version, about = "Monitor sensors and control relays", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, env = "RELAYWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub api: ApiArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll sensors and print readings and alerts until Ctrl+C
    Watch {
        /// Only watch sensors of this controller
        #[arg(short, long)]
        controller: Option<Uuid>,

        /// Stop after this many snapshots (0 for no limit)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show readings of a controller's sensors over a time window
    History {
        /// Controller whose sensors to load
        #[arg(short, long)]
        controller: Uuid,

        /// Named window (e.g. today, this_week, last_1h)
        #[arg(short, long, conflicts_with_all = ["from", "to"])]
        preset: Option<Preset>,

        /// Window start (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Window end (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Number of axis ticks to print (1-50)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TICK_COUNT)))]
        ticks: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Flip a relay on or off
    Relay {
        /// Relay UUID
        relay: Uuid,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Switch a controller between manual and automatic mode
    Mode {
        /// Numeric controller id
        controller: u64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the signed-in user, controllers and relays
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
