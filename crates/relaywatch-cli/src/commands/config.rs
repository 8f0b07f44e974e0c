//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::style;

pub fn cmd_config(action: ConfigAction, config: &Config, path: &Path, no_color: bool) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", render(config)?);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            init(path, force)?;
            println!(
                "{}",
                style::format_success(
                    &format!("Wrote default config to {}", path.display()),
                    no_color
                )
            );
        }
    }
    Ok(())
}

/// The effective configuration as TOML, with the token masked.
fn render(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    if shown.api.token.is_some() {
        shown.api.token = Some("********".to_string());
    }
    toml::to_string_pretty(&shown).context("Failed to serialize config")
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file {} already exists. Use --force to overwrite.",
            path.display()
        );
    }
    Config::default().save(path)?;
    Ok(())
}
