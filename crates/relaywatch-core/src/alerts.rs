//! The live alert set.
//!
//! [`AlertAggregator`] recomputes the set of sensors in WARNING or CRITICAL
//! state from each published snapshot. The new set replaces the old one
//! wholesale, so an alert disappears as soon as its reading classifies as
//! NORMAL again. There is no acknowledgement state and no alert history.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use relaywatch_types::{Reading, Sensor, Severity};

use crate::thresholds;

/// A sensor whose latest reading is outside its normal band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEntry {
    pub sensor: Sensor,
    pub reading: Reading,
    /// Always [`Severity::Warning`] or [`Severity::Critical`].
    pub severity: Severity,
}

/// Display order: CRITICAL before WARNING, then by sensor name.
fn display_order(a: &AlertEntry, b: &AlertEntry) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.sensor.name.cmp(&b.sensor.name))
        .then_with(|| a.sensor.uuid.cmp(&b.sensor.uuid))
}

/// Maintains the current alert set.
#[derive(Debug, Default)]
pub struct AlertAggregator {
    entries: Vec<AlertEntry>,
}

impl AlertAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the alert set from the latest readings.
    ///
    /// Sensors without a reading in `latest` are skipped. Returns the new set
    /// in display order.
    pub fn update(&mut self, sensors: &[Sensor], latest: &HashMap<Uuid, Reading>) -> &[AlertEntry] {
        let mut entries: Vec<AlertEntry> = sensors
            .iter()
            .filter_map(|sensor| {
                let reading = latest.get(&sensor.uuid)?;
                let severity = thresholds::evaluate(sensor, reading);
                severity.is_alert().then(|| AlertEntry {
                    sensor: sensor.clone(),
                    reading: reading.clone(),
                    severity,
                })
            })
            .collect();
        entries.sort_by(display_order);

        let previous: HashMap<Uuid, Severity> = self
            .entries
            .iter()
            .map(|e| (e.sensor.uuid, e.severity))
            .collect();
        for entry in &entries {
            if previous.get(&entry.sensor.uuid) != Some(&entry.severity) {
                info!(
                    "{} alert on '{}': value {}",
                    entry.severity, entry.sensor.name, entry.reading.value
                );
            }
        }
        for old in &self.entries {
            if !entries.iter().any(|e| e.sensor.uuid == old.sensor.uuid) {
                info!("Alert cleared on '{}'", old.sensor.name);
            }
        }

        self.entries = entries;
        &self.entries
    }

    /// Current alerts in display order.
    pub fn entries(&self) -> &[AlertEntry] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any sensor is currently critical.
    pub fn has_critical(&self) -> bool {
        self.entries
            .first()
            .is_some_and(|e| e.severity == Severity::Critical)
    }

    /// Number of alerts at the given severity.
    pub fn count_at(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sensor(name: &str, thresholds: Option<(f64, f64)>) -> Sensor {
        let s = Sensor::new(Uuid::new_v4(), name, Uuid::new_v4());
        match thresholds {
            Some((min, max)) => s.with_thresholds(min, max),
            None => s,
        }
    }

    fn reading(sensor: &Sensor, value: f64) -> Reading {
        Reading {
            sensor_uuid: sensor.uuid,
            value,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn latest(pairs: &[(&Sensor, f64)]) -> HashMap<Uuid, Reading> {
        pairs
            .iter()
            .map(|(s, v)| (s.uuid, reading(s, *v)))
            .collect()
    }

    #[test]
    fn test_reference_classification() {
        let warn = sensor("warn", Some((10.0, 20.0)));
        let normal = sensor("normal", Some((10.0, 20.0)));
        let crit = sensor("crit", Some((10.0, 20.0)));
        let open = sensor("open", None);
        let sensors = vec![warn.clone(), normal.clone(), crit.clone(), open.clone()];

        let mut agg = AlertAggregator::new();
        let entries = agg.update(
            &sensors,
            &latest(&[(&warn, 19.0), (&normal, 15.0), (&crit, 21.0), (&open, 1e9)]),
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sensor.uuid, crit.uuid);
        assert_eq!(entries[0].severity, Severity::Critical);
        assert_eq!(entries[1].sensor.uuid, warn.uuid);
        assert_eq!(entries[1].severity, Severity::Warning);
        assert!(agg.has_critical());
        assert_eq!(agg.count_at(Severity::Warning), 1);
    }

    #[test]
    fn test_order_ties_by_name() {
        let b = sensor("bravo", Some((0.0, 10.0)));
        let a = sensor("alpha", Some((0.0, 10.0)));
        let c = sensor("charlie", Some((0.0, 10.0)));
        let sensors = vec![b.clone(), a.clone(), c.clone()];

        let mut agg = AlertAggregator::new();
        agg.update(&sensors, &latest(&[(&b, 9.5), (&a, 0.5), (&c, 11.0)]));

        let names: Vec<&str> = agg.entries().iter().map(|e| e.sensor.name.as_str()).collect();
        assert_eq!(names, vec!["charlie", "alpha", "bravo"]);
    }

    #[test]
    fn test_update_replaces_previous_set() {
        let s = sensor("boiler", Some((10.0, 20.0)));
        let sensors = vec![s.clone()];
        let mut agg = AlertAggregator::new();

        agg.update(&sensors, &latest(&[(&s, 25.0)]));
        assert_eq!(agg.count(), 1);

        agg.update(&sensors, &latest(&[(&s, 15.0)]));
        assert!(agg.is_empty());
        assert!(!agg.has_critical());
    }

    #[test]
    fn test_inverted_bounds_still_raise_critical() {
        let s = sensor("swapped", Some((20.0, 10.0)));
        let mut agg = AlertAggregator::new();
        agg.update(&[s.clone()], &latest(&[(&s, 100.0)]));
        assert_eq!(agg.count_at(Severity::Critical), 1);
    }

    #[test]
    fn test_sensor_without_reading_is_skipped() {
        let s = sensor("boiler", Some((10.0, 20.0)));
        let mut agg = AlertAggregator::new();
        agg.update(&[s.clone()], &latest(&[(&s, 25.0)]));
        agg.update(&[s], &HashMap::new());
        assert_eq!(agg.count(), 0);
    }

    #[test]
    fn test_reading_for_unwatched_sensor_is_ignored() {
        let watched = sensor("watched", Some((10.0, 20.0)));
        let other = sensor("other", Some((10.0, 20.0)));
        let mut agg = AlertAggregator::new();
        agg.update(&[watched], &latest(&[(&other, 99.0)]));
        assert!(agg.is_empty());
    }
}
