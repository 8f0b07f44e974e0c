//! Command implementations for the CLI.

mod config;
mod control;
mod history;
mod status;
mod watch;

pub use config::cmd_config;
pub use control::{cmd_mode, cmd_relay};
pub use history::{HistoryArgs, cmd_history};
pub use status::cmd_status;
pub use watch::{WatchArgs, cmd_watch};
