//! Utility functions for CLI operations.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use relaywatch_core::HttpApi;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::cli::ApiArgs;
use crate::config::Config;

/// Build the service client, letting flags and environment override the config.
pub fn connect(args: &ApiArgs, config: &Config) -> Result<Arc<HttpApi>> {
    let base_url = args.url.as_deref().unwrap_or(&config.api.base_url);
    let token = args.token.clone().or_else(|| config.api.token.clone());

    let api = HttpApi::with_timeout(base_url, token, config.api.timeout())
        .with_context(|| format!("Invalid service URL '{}'", base_url))?;
    if !api.has_token() {
        tracing::debug!("No token configured; requests are sent without credentials");
    }
    Ok(Arc::new(api))
}

/// Parse a window bound given as RFC 3339 or a bare `YYYY-MM-DD` date.
///
/// Bare dates mean midnight at `offset`.
pub fn parse_instant(s: &str, offset: UtcOffset) -> Result<OffsetDateTime> {
    let s = s.trim();
    if let Ok(instant) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(instant);
    }
    let date = Date::parse(s, format_description!("[year]-[month]-[day]")).with_context(|| {
        format!(
            "Invalid date/time '{}'. Use RFC 3339 (2025-03-10T08:00:00Z) or YYYY-MM-DD",
            s
        )
    })?;
    Ok(date.with_time(Time::MIDNIGHT).assume_offset(offset))
}

/// The current instant in the local offset, falling back to UTC.
pub fn local_now(offset: UtcOffset) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(offset)
}

/// Ask the user to confirm a command.
///
/// `assume_yes` skips the prompt. Without a terminal there is nobody to ask,
/// so the command is refused unless `assume_yes` is set.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        bail!("Refusing to send a command without confirmation. Re-run with --yes.");
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
