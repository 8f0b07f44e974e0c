//! Watch command implementation.
//!
//! Runs the polling scheduler in the background and prints every published
//! snapshot together with the current alert list. Stops on Ctrl+C, after the
//! requested number of snapshots, or when the session expires.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use relaywatch_core::{
    AlertAggregator, HttpApi, PollingScheduler, SchedulerState, Snapshot, TelemetryApi, classify,
};
use relaywatch_types::Sensor;
use serde_json::json;
use time::UtcOffset;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::style;
use crate::util::{local_now, print_json};

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub controller: Option<Uuid>,
    pub count: u32,
    pub format: OutputFormat,
    pub config: &'a Config,
    pub offset: UtcOffset,
    pub no_color: bool,
    pub quiet: bool,
}

pub async fn cmd_watch(api: Arc<HttpApi>, args: WatchArgs<'_>) -> Result<()> {
    let WatchArgs {
        controller,
        count,
        format,
        config,
        offset,
        no_color,
        quiet,
    } = args;

    let sensors: Vec<Sensor> = api
        .list_sensors()
        .await?
        .into_iter()
        .filter(|s| controller.is_none_or(|c| s.controller_uuid == c))
        .collect();
    if sensors.is_empty() {
        bail!("No sensors to watch");
    }

    let options = config.monitor.poll_options();
    let interval = options.interval;
    let mut scheduler = PollingScheduler::new(api, options)?;
    scheduler.set_watch_set(sensors.iter().map(|s| s.uuid));

    let mut snapshots = scheduler.subscribe();
    let mut state = scheduler.subscribe_state();

    if !quiet {
        eprintln!(
            "Watching {} sensors | Interval: {}s | Press Ctrl+C to stop",
            sensors.len(),
            interval.as_secs()
        );
        eprintln!("{}", "-".repeat(60));
    }

    scheduler.start();

    let mut alerts = AlertAggregator::new();
    let mut previous: HashMap<Uuid, f64> = HashMap::new();
    let mut printed: u32 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                break;
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow_and_update() == SchedulerState::Unauthenticated {
                    scheduler.stop().await;
                    bail!("Session expired. Sign in again and set RELAYWATCH_TOKEN.");
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                alerts.update(&sensors, &snapshot.readings);

                match format {
                    OutputFormat::Json => print_json(&snapshot_json(&snapshot, &alerts))?,
                    OutputFormat::Text => {
                        print!(
                            "{}",
                            format_snapshot(&snapshot, &sensors, &alerts, &previous, offset, no_color)
                        );
                    }
                }
                previous = snapshot
                    .readings
                    .iter()
                    .map(|(id, r)| (*id, r.value))
                    .collect();

                printed += 1;
                if count > 0 && printed >= count {
                    break;
                }
            }
        }
    }

    scheduler.stop().await;
    Ok(())
}

fn snapshot_json(snapshot: &Snapshot, alerts: &AlertAggregator) -> serde_json::Value {
    let mut stale: Vec<&Uuid> = snapshot.stale.iter().collect();
    stale.sort();
    json!({
        "cycle": snapshot.cycle,
        "readings": snapshot.readings,
        "stale": stale,
        "alerts": alerts.entries(),
    })
}

fn format_snapshot(
    snapshot: &Snapshot,
    sensors: &[Sensor],
    alerts: &AlertAggregator,
    previous: &HashMap<Uuid, f64>,
    offset: UtcOffset,
    no_color: bool,
) -> String {
    let mut out = format!(
        "[{}] cycle {}\n",
        style::format_clock(local_now(offset)),
        snapshot.cycle
    );

    for sensor in sensors {
        let line = match snapshot.reading(&sensor.uuid) {
            Some(reading) => {
                let severity = classify(reading.value, sensor.critical_min, sensor.critical_max);
                let trend = style::trend_indicator(
                    reading.value,
                    previous.get(&sensor.uuid).copied(),
                    no_color,
                );
                let stale = if snapshot.is_stale(&sensor.uuid) {
                    " (stale)"
                } else {
                    ""
                };
                format!(
                    "{} {}{}",
                    style::format_value(reading.value, sensor.unit.as_deref(), severity, no_color),
                    trend,
                    stale
                )
            }
            None => "no data".to_string(),
        };
        out.push_str(&format!("  {:<24} {}\n", sensor.name, line));
    }

    if !alerts.is_empty() {
        out.push_str(&format!("  Alerts ({}):\n", alerts.count()));
        for entry in alerts.entries() {
            out.push_str(&format!(
                "    {:<8} {} = {}\n",
                style::format_severity(entry.severity, no_color),
                entry.sensor.name,
                entry.reading.value
            ));
        }
    }
    out
}
