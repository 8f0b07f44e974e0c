//! History command implementation.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use relaywatch_core::{
    HistoryLoad, HistoryLoader, HttpApi, Preset, TelemetryApi, TimeWindow, WindowSelection,
    classify, resolve, ticks,
};
use relaywatch_types::Sensor;
use serde_json::json;
use time::UtcOffset;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::style;
use crate::util::{local_now, parse_instant, print_json};

/// Arguments for the history command.
pub struct HistoryArgs<'a> {
    pub controller: Uuid,
    pub preset: Option<Preset>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub ticks: Option<u32>,
    pub format: OutputFormat,
    pub config: &'a Config,
    pub offset: UtcOffset,
    pub no_color: bool,
}

pub async fn cmd_history(api: Arc<HttpApi>, args: HistoryArgs<'_>) -> Result<()> {
    let HistoryArgs {
        controller,
        preset,
        from,
        to,
        ticks: tick_count,
        format,
        config,
        offset,
        no_color,
    } = args;

    let now = local_now(offset);
    let window = select_window(
        preset.unwrap_or(config.monitor.default_preset),
        from.as_deref(),
        to.as_deref(),
        now,
        offset,
    )?;

    let sensors: Vec<Sensor> = api
        .list_sensors()
        .await?
        .into_iter()
        .filter(|s| s.controller_uuid == controller)
        .collect();
    if sensors.is_empty() {
        bail!("Controller {} has no sensors", controller);
    }

    let uuids: Vec<Uuid> = sensors.iter().map(|s| s.uuid).collect();
    let loader = HistoryLoader::new(api);
    let Some(load) = loader.load(&uuids, window).await? else {
        bail!("History load was superseded");
    };

    for failed in &load.failed {
        let name = sensors
            .iter()
            .find(|s| s.uuid == *failed)
            .map_or("unknown", |s| s.name.as_str());
        eprintln!(
            "{}",
            style::format_warning(&format!("Could not load history of '{}'", name), no_color)
        );
    }

    let tick_count = tick_count.unwrap_or(config.monitor.tick_count);
    match format {
        OutputFormat::Json => print_json(&history_json(&sensors, &load, tick_count))?,
        OutputFormat::Text => print!("{}", format_history(&sensors, &load, tick_count, no_color)),
    }
    Ok(())
}

/// Resolve the window from a preset, optionally overridden by explicit bounds.
///
/// A bound that is not given comes from the preset.
fn select_window(
    preset: Preset,
    from: Option<&str>,
    to: Option<&str>,
    now: time::OffsetDateTime,
    offset: UtcOffset,
) -> Result<TimeWindow> {
    if from.is_none() && to.is_none() {
        return Ok(WindowSelection::new(preset, now).window());
    }

    let base = resolve(preset, now);
    let from = from
        .map(|s| parse_instant(s, offset))
        .transpose()?
        .unwrap_or(base.from());
    let to = to
        .map(|s| parse_instant(s, offset))
        .transpose()?
        .unwrap_or(base.to());
    TimeWindow::new(from.to_offset(offset), to.to_offset(offset))
        .context("The window start must not be after its end")
}

fn history_json(sensors: &[Sensor], load: &HistoryLoad, tick_count: u32) -> serde_json::Value {
    let series: Vec<serde_json::Value> = sensors
        .iter()
        .map(|s| {
            json!({
                "sensor": s.uuid,
                "name": s.name,
                "unit": s.unit,
                "readings": load.series(&s.uuid),
            })
        })
        .collect();
    json!({
        "window": load.window,
        "ticks": ticks(&load.window, tick_count)
            .into_iter()
            .map(style::format_timestamp)
            .collect::<Vec<_>>(),
        "series": series,
        "failed": load.failed,
    })
}

fn format_history(sensors: &[Sensor], load: &HistoryLoad, tick_count: u32, no_color: bool) -> String {
    let window = load.window;
    let mut out = style::format_title(
        &format!(
            "{} .. {}",
            style::format_timestamp(window.from()),
            style::format_timestamp(window.to())
        ),
        no_color,
    );
    out.push('\n');

    let axis: Vec<String> = ticks(&window, tick_count)
        .into_iter()
        .map(style::format_timestamp)
        .collect();
    out.push_str(&format!("Ticks: {}\n", axis.join(" | ")));

    for sensor in sensors {
        let readings = load.series(&sensor.uuid);
        out.push_str(&format!("\n{} ({} readings)\n", sensor.name, readings.len()));
        if readings.is_empty() {
            out.push_str("  no data\n");
            continue;
        }
        for reading in readings {
            let severity = classify(reading.value, sensor.critical_min, sensor.critical_max);
            out.push_str(&format!(
                "  {}  {}\n",
                style::format_timestamp(reading.timestamp.to_offset(window.from().offset())),
                style::format_value(reading.value, sensor.unit.as_deref(), severity, no_color)
            ));
        }
    }
    out
}
