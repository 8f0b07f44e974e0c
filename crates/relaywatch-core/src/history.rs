//! Historical readings for a chart.
//!
//! A chart shows several sensors over one window. [`HistoryLoader::load`]
//! queries every sensor concurrently; a sensor whose query fails gets an empty
//! series and is listed in [`HistoryLoad::failed`] instead of failing the whole
//! load. Loads are numbered, and a load that completes after a newer one was
//! started is discarded so a slow query never overwrites the newer window.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use relaywatch_types::{Reading, TimeWindow};

use crate::error::{Error, Result};
use crate::traits::TelemetryApi;

/// Readings for every requested sensor over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLoad {
    pub window: TimeWindow,
    /// Series per sensor, ordered by timestamp. Failed sensors map to an empty series.
    pub series: HashMap<Uuid, Vec<Reading>>,
    /// Sensors whose query failed.
    pub failed: Vec<Uuid>,
}

impl HistoryLoad {
    pub fn series(&self, sensor_uuid: &Uuid) -> &[Reading] {
        self.series.get(sensor_uuid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of readings across all series.
    pub fn total_readings(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }
}

/// Loads multi-sensor history, discarding superseded loads.
pub struct HistoryLoader<A: TelemetryApi + ?Sized> {
    api: Arc<A>,
    generation: AtomicU64,
}

impl<A: TelemetryApi + ?Sized> HistoryLoader<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            generation: AtomicU64::new(0),
        }
    }

    /// Load the readings of `sensors` within `window`.
    ///
    /// Returns `Ok(None)` if another load started while this one was in flight.
    /// Authentication failures fail the whole load; any other per-sensor error
    /// is isolated.
    pub async fn load(&self, sensors: &[Uuid], window: TimeWindow) -> Result<Option<HistoryLoad>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Loading history for {} sensors from {} to {}",
            sensors.len(),
            window.from(),
            window.to()
        );

        let queries = sensors.iter().map(|&uuid| async move {
            let result = self
                .api
                .readings_in_range(uuid, window.from(), window.to())
                .await;
            (uuid, result)
        });
        let results = join_all(queries).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("History load {} superseded, discarding", generation);
            return Ok(None);
        }

        let mut load = HistoryLoad {
            window,
            series: HashMap::with_capacity(results.len()),
            failed: Vec::new(),
        };
        for (uuid, result) in results {
            match result {
                Ok(mut readings) => {
                    readings.retain(|r| r.value.is_finite());
                    readings.sort_by_key(|r| r.timestamp);
                    load.series.insert(uuid, readings);
                }
                Err(e) if e.is_auth_failure() => return Err(Error::Unauthenticated),
                Err(e) => {
                    warn!("Failed to load history of {}: {}", uuid, e);
                    load.series.insert(uuid, Vec::new());
                    load.failed.push(uuid);
                }
            }
        }
        Ok(Some(load))
    }

    /// Invalidate any load in flight.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
