//! Visual styling utilities for the CLI.
//!
//! Every function takes `no_color` and falls back to plain text, so output
//! stays readable when piped or when NO_COLOR is set.

use owo_colors::OwoColorize;
use relaywatch_types::{ControlMode, Severity};
use time::OffsetDateTime;
use time::macros::format_description;

// ============================================================================
// Severity and State
// ============================================================================

/// Format a severity label, colored by level.
pub fn format_severity(severity: Severity, no_color: bool) -> String {
    if no_color {
        return severity.to_string();
    }

    match severity {
        Severity::Normal => format!("{}", severity.green()),
        Severity::Warning => format!("{}", severity.yellow()),
        Severity::Critical => format!("{}", severity.red().bold()),
    }
}

/// Format a reading value with its unit, colored by severity.
pub fn format_value(value: f64, unit: Option<&str>, severity: Severity, no_color: bool) -> String {
    let formatted = match unit {
        Some(unit) => format!("{:.2} {}", value, unit),
        None => format!("{:.2}", value),
    };
    if no_color {
        return formatted;
    }

    match severity {
        Severity::Normal => formatted,
        Severity::Warning => format!("{}", formatted.yellow()),
        Severity::Critical => format!("{}", formatted.red()),
    }
}

/// Format a controller's control mode.
pub fn format_mode(mode: ControlMode, no_color: bool) -> String {
    if no_color {
        return mode.to_string();
    }

    match mode {
        ControlMode::Manual => format!("{}", mode.cyan()),
        ControlMode::Auto => format!("{}", mode.magenta()),
    }
}

/// Format a relay's on/off state.
pub fn format_relay_state(is_working: bool, no_color: bool) -> String {
    let label = if is_working { "ON" } else { "OFF" };
    if no_color {
        label.to_string()
    } else if is_working {
        format!("{}", label.green())
    } else {
        format!("{}", label.dimmed())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Format a title header.
pub fn format_title(title: &str, no_color: bool) -> String {
    let underline = "━".repeat(title.chars().count());
    if no_color {
        format!("{}\n{}", title, underline)
    } else {
        format!("{}\n{}", title.bold(), underline.dimmed())
    }
}

// ============================================================================
// Trend Indicators
// ============================================================================

/// Get trend indicator comparing current and previous values.
pub fn trend_indicator(current: f64, previous: Option<f64>, no_color: bool) -> &'static str {
    let Some(previous) = previous else {
        return "~";
    };
    let diff = current - previous;
    if diff.abs() < f64::EPSILON {
        "-"
    } else if diff > 0.0 {
        if no_color { "^" } else { "↑" }
    } else if no_color {
        "v"
    } else {
        "↓"
    }
}

// ============================================================================
// Time
// ============================================================================

/// Format an instant as `YYYY-MM-DD HH:MM:SS` in its own offset.
pub fn format_timestamp(instant: OffsetDateTime) -> String {
    instant
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| instant.to_string())
}

/// Format an instant as `HH:MM:SS` in its own offset.
pub fn format_clock(instant: OffsetDateTime) -> String {
    instant
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| instant.to_string())
}
