//! Periodic refresh of the latest value of every watched sensor.
//!
//! The [`PollingScheduler`] runs one cycle per interval. A cycle fetches the
//! latest reading of every sensor in the current watch set concurrently, waits
//! for all fetches to settle, and publishes a single [`Snapshot`]. Partial
//! results are never published.
//!
//! Failure handling per sensor:
//!
//! | fetch result | snapshot entry |
//! |--------------|----------------|
//! | reading | the new reading |
//! | no reading | removed ("no data") |
//! | error or timeout | previous reading kept, sensor marked stale |
//!
//! The watch set is re-read at the start of every cycle. Changing it, or
//! stopping the scheduler, discards the result of any cycle still in flight.
//! An authentication failure stops the scheduler; see
//! [`SchedulerState::Unauthenticated`].
//!
//! # Example
//!
//! ```ignore
//! let mut scheduler = PollingScheduler::new(api, PollOptions::default())?;
//! scheduler.set_watch_set(sensors.iter().map(|s| s.uuid));
//! let mut snapshots = scheduler.subscribe();
//! scheduler.start();
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow_and_update().clone();
//!     alerts.update(&sensors, &snapshot.readings);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use relaywatch_types::Reading;

use crate::error::{Error, Result};
use crate::traits::TelemetryApi;

/// Default time between cycle starts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive failures of one sensor logged at `warn` before going quiet.
const LOUD_FAILURES: u32 = 3;

/// Options for the polling scheduler.
///
/// Use the builder pattern for convenient configuration:
///
/// ```
/// use std::time::Duration;
/// use relaywatch_core::PollOptions;
///
/// let options = PollOptions::builder()
///     .interval(Duration::from_secs(10))
///     .fetch_timeout(Duration::from_secs(3))
///     .build();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Time between cycle starts.
    /// Default: 5 seconds.
    pub interval: Duration,
    /// Limit on a single sensor's fetch. A fetch that runs over counts as a
    /// failure for that sensor.
    /// Default: none.
    pub fetch_timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: None,
        }
    }
}

impl PollOptions {
    /// Create a new builder for PollOptions.
    pub fn builder() -> PollOptionsBuilder {
        PollOptionsBuilder::default()
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::invalid_config("interval must be > 0"));
        }
        if self.fetch_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_config("fetch_timeout must be > 0"));
        }
        Ok(())
    }
}

/// Builder for PollOptions.
#[derive(Debug, Clone, Default)]
pub struct PollOptionsBuilder {
    options: PollOptions,
}

impl PollOptionsBuilder {
    /// Set the time between cycle starts.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = interval;
        self
    }

    /// Set the per-sensor fetch limit.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.options.fetch_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn build(self) -> PollOptions {
        self.options
    }
}

/// The result of one polling cycle across all watched sensors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Number of snapshots published before and including this one.
    pub cycle: u64,
    /// Latest known reading per sensor. Sensors with no data are absent.
    pub readings: HashMap<Uuid, Reading>,
    /// Sensors whose fetch failed this cycle.
    pub stale: HashSet<Uuid>,
}

impl Snapshot {
    pub fn reading(&self, sensor_uuid: &Uuid) -> Option<&Reading> {
        self.readings.get(sensor_uuid)
    }

    /// Whether the sensor's entry was carried over from an earlier cycle.
    pub fn is_stale(&self, sensor_uuid: &Uuid) -> bool {
        self.stale.contains(sensor_uuid)
    }
}

/// Lifecycle of the background polling task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Never started.
    Idle,
    Running,
    /// Stopped by the caller.
    Stopped,
    /// Stopped because the session is no longer authenticated.
    Unauthenticated,
}

#[derive(Debug, Clone, Default)]
struct WatchSet {
    generation: u64,
    sensors: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct CycleState {
    published: u64,
    failures: HashMap<Uuid, u32>,
}

struct Shared<A: ?Sized> {
    api: Arc<A>,
    options: PollOptions,
    watch_set: watch::Sender<WatchSet>,
    snapshot: watch::Sender<Arc<Snapshot>>,
    state: watch::Sender<SchedulerState>,
    /// Held for the duration of a cycle so cycles never overlap.
    cycle: Mutex<CycleState>,
}

/// Drives periodic concurrent refresh of the watched sensors.
///
/// The background task is cancelled when the scheduler is dropped.
pub struct PollingScheduler<A: TelemetryApi + ?Sized> {
    shared: Arc<Shared<A>>,
    task: Option<(CancellationToken, JoinHandle<()>)>,
}

impl<A: TelemetryApi + ?Sized + 'static> PollingScheduler<A> {
    /// Create a stopped scheduler with an empty watch set.
    pub fn new(api: Arc<A>, options: PollOptions) -> Result<Self> {
        options.validate()?;
        let (watch_set, _) = watch::channel(WatchSet::default());
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::default()));
        let (state, _) = watch::channel(SchedulerState::Idle);
        Ok(Self {
            shared: Arc::new(Shared {
                api,
                options,
                watch_set,
                snapshot,
                state,
                cycle: Mutex::new(CycleState::default()),
            }),
            task: None,
        })
    }

    pub fn options(&self) -> &PollOptions {
        &self.shared.options
    }

    /// Replace the set of watched sensors.
    ///
    /// Takes effect at the start of the next cycle; a cycle already in flight
    /// is discarded.
    pub fn set_watch_set(&self, sensors: impl IntoIterator<Item = Uuid>) {
        let mut sensors: Vec<Uuid> = sensors.into_iter().collect();
        sensors.sort_unstable();
        sensors.dedup();
        self.shared.watch_set.send_modify(|set| {
            set.generation += 1;
            set.sensors = sensors;
        });
    }

    /// Currently watched sensors.
    pub fn watch_set(&self) -> Vec<Uuid> {
        self.shared.watch_set.borrow().sensors.clone()
    }

    /// Start the background task. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let task_token = cancel.clone();
        shared.state.send_replace(SchedulerState::Running);
        info!(
            "Starting polling scheduler (interval: {:?})",
            shared.options.interval
        );
        let handle = tokio::spawn(run(shared, task_token));
        self.task = Some((cancel, handle));
    }

    /// Stop the background task and wait for it to exit.
    ///
    /// A cycle in flight is abandoned without publishing.
    pub async fn stop(&mut self) {
        if let Some((cancel, handle)) = self.task.take() {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Polling task ended abnormally: {}", e);
            }
            self.shared.state.send_if_modified(|state| {
                if *state == SchedulerState::Running {
                    *state = SchedulerState::Stopped;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Whether the background task is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(cancel, handle)| !cancel.is_cancelled() && !handle.is_finished())
    }

    /// Run a single cycle now, outside the timer.
    ///
    /// Returns `Ok(true)` if a snapshot was published and `Ok(false)` if the
    /// result was discarded because the watch set changed mid-flight.
    pub async fn poll_once(&self) -> Result<bool> {
        run_cycle(&self.shared, &CancellationToken::new()).await
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.shared.snapshot.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.shared.snapshot.borrow())
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.borrow()
    }

    /// Receive scheduler state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.shared.state.subscribe()
    }
}

impl<A: TelemetryApi + ?Sized> Drop for PollingScheduler<A> {
    fn drop(&mut self) {
        if let Some((cancel, _)) = &self.task {
            cancel.cancel();
        }
    }
}

async fn run<A: TelemetryApi + ?Sized>(shared: Arc<Shared<A>>, cancel: CancellationToken) {
    let mut ticker = interval(shared.options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Polling scheduler cancelled, stopping gracefully");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = run_cycle(&shared, &cancel).await {
                    if e.is_auth_failure() {
                        warn!("Session is no longer authenticated, stopping polling");
                        shared.state.send_replace(SchedulerState::Unauthenticated);
                        return;
                    }
                    warn!("Poll cycle failed: {}", e);
                }
            }
        }
    }
    shared.state.send_replace(SchedulerState::Stopped);
}

/// Fetch, then publish unless cancelled or superseded.
async fn run_cycle<A: TelemetryApi + ?Sized>(
    shared: &Shared<A>,
    cancel: &CancellationToken,
) -> Result<bool> {
    let mut cycle = shared.cycle.lock().await;
    let watch_set = shared.watch_set.borrow().clone();
    debug!(
        "Poll cycle {} starting for {} sensors",
        cycle.published + 1,
        watch_set.sensors.len()
    );

    let fetches = watch_set.sensors.iter().map(|&uuid| {
        let api = &shared.api;
        let limit = shared.options.fetch_timeout;
        async move { (uuid, fetch_latest(api.as_ref(), uuid, limit).await) }
    });

    let results = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Poll cycle cancelled in flight, discarding");
            return Ok(false);
        }
        results = join_all(fetches) => results,
    };

    if cancel.is_cancelled() {
        debug!("Poll cycle finished after stop, discarding");
        return Ok(false);
    }
    if shared.watch_set.borrow().generation != watch_set.generation {
        debug!("Watch set changed during poll cycle, discarding");
        return Ok(false);
    }
    if results
        .iter()
        .any(|(_, r)| r.as_ref().is_err_and(Error::is_auth_failure))
    {
        return Err(Error::Unauthenticated);
    }

    let previous = Arc::clone(&shared.snapshot.borrow());
    let mut next = Snapshot {
        cycle: cycle.published + 1,
        ..Snapshot::default()
    };
    for (uuid, result) in results {
        match result {
            Ok(reading) => {
                if let Some(failed) = cycle.failures.remove(&uuid) {
                    info!("Sensor {} recovered after {} failed fetches", uuid, failed);
                }
                if let Some(reading) = reading {
                    next.readings.insert(uuid, reading);
                }
            }
            Err(e) => {
                let failures = cycle.failures.entry(uuid).or_insert(0);
                *failures += 1;
                if *failures <= LOUD_FAILURES {
                    warn!(
                        "Failed to fetch latest reading of {}: {} (attempt {})",
                        uuid, e, failures
                    );
                } else if *failures == LOUD_FAILURES + 1 {
                    error!(
                        "Failed to fetch latest reading of {} after {} attempts, will continue trying silently",
                        uuid, failures
                    );
                }
                if let Some(kept) = previous.reading(&uuid) {
                    next.readings.insert(uuid, kept.clone());
                }
                next.stale.insert(uuid);
            }
        }
    }
    // Forget sensors that left the watch set.
    cycle
        .failures
        .retain(|uuid, _| watch_set.sensors.contains(uuid));

    cycle.published = next.cycle;
    debug!(
        "Poll cycle {} published: {} readings, {} stale",
        next.cycle,
        next.readings.len(),
        next.stale.len()
    );
    shared.snapshot.send_replace(Arc::new(next));
    Ok(true)
}

async fn fetch_latest<A: TelemetryApi + ?Sized>(
    api: &A,
    sensor_uuid: Uuid,
    limit: Option<Duration>,
) -> Result<Option<Reading>> {
    let reading = match limit {
        Some(limit) => tokio::time::timeout(limit, api.latest_reading(sensor_uuid))
            .await
            .map_err(|_| Error::timeout("latest_reading", limit))??,
        None => api.latest_reading(sensor_uuid).await?,
    };
    if let Some(reading) = &reading {
        reading.validate()?;
    }
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockApi;
    use relaywatch_types::Sensor;

    fn sensor(name: &str) -> Sensor {
        Sensor::new(Uuid::new_v4(), name, Uuid::new_v4())
    }

    fn scheduler(api: &Arc<MockApi>, sensors: &[&Sensor]) -> PollingScheduler<MockApi> {
        let s = PollingScheduler::new(Arc::clone(api), PollOptions::default()).unwrap();
        s.set_watch_set(sensors.iter().map(|s| s.uuid));
        s
    }

    // --- Options ---

    #[test]
    fn test_poll_options_default() {
        let options = PollOptions::default();
        assert_eq!(options.interval, Duration::from_secs(5));
        assert!(options.fetch_timeout.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_poll_options_validate() {
        let zero = PollOptions::builder().interval(Duration::ZERO).build();
        assert!(matches!(zero.validate(), Err(Error::InvalidConfig(_))));

        let zero_timeout = PollOptions::builder()
            .fetch_timeout(Duration::ZERO)
            .build();
        assert!(zero_timeout.validate().is_err());

        assert!(PollingScheduler::new(Arc::new(MockApi::new()), zero).is_err());
    }

    // --- Single cycles ---

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_value() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        let sched = scheduler(&api, &[&s]);

        assert!(sched.poll_once().await.unwrap());
        assert_eq!(sched.latest().reading(&s.uuid).unwrap().value, 1.0);

        api.set_latest(s.uuid, 2.0).await;
        api.set_transient_failures(s.uuid, 1).await;
        assert!(sched.poll_once().await.unwrap());
        let snap = sched.latest();
        assert_eq!(snap.cycle, 2);
        assert_eq!(snap.reading(&s.uuid).unwrap().value, 1.0);
        assert!(snap.is_stale(&s.uuid));

        assert!(sched.poll_once().await.unwrap());
        let snap = sched.latest();
        assert_eq!(snap.reading(&s.uuid).unwrap().value, 2.0);
        assert!(!snap.is_stale(&s.uuid));
    }

    #[tokio::test]
    async fn test_failure_without_previous_value_is_no_data() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        api.set_sensor_failing(s.uuid, true).await;
        let sched = scheduler(&api, &[&s]);

        assert!(sched.poll_once().await.unwrap());
        let snap = sched.latest();
        assert!(snap.reading(&s.uuid).is_none());
        assert!(snap.is_stale(&s.uuid));
    }

    #[tokio::test]
    async fn test_absent_reading_clears_value() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        let sched = scheduler(&api, &[&s]);

        sched.poll_once().await.unwrap();
        api.clear_latest(s.uuid).await;
        sched.poll_once().await.unwrap();

        let snap = sched.latest();
        assert!(snap.reading(&s.uuid).is_none());
        assert!(!snap.is_stale(&s.uuid));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let good = sensor("good");
        let bad = sensor("bad");
        let api = Arc::new(
            MockApi::builder()
                .latest(good.uuid, 3.0)
                .latest(bad.uuid, 4.0)
                .build(),
        );
        api.set_sensor_failing(bad.uuid, true).await;
        let sched = scheduler(&api, &[&good, &bad]);

        sched.poll_once().await.unwrap();
        let snap = sched.latest();
        assert_eq!(snap.reading(&good.uuid).unwrap().value, 3.0);
        assert!(snap.reading(&bad.uuid).is_none());
        assert_eq!(api.latest_calls(), 2);
    }

    #[tokio::test]
    async fn test_non_finite_reading_counts_as_failure() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        let sched = scheduler(&api, &[&s]);
        sched.poll_once().await.unwrap();

        api.set_latest(s.uuid, f64::NAN).await;
        sched.poll_once().await.unwrap();
        let snap = sched.latest();
        assert_eq!(snap.reading(&s.uuid).unwrap().value, 1.0);
        assert!(snap.is_stale(&s.uuid));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_counts_as_failure() {
        let s = sensor("slow");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        api.set_latency(Duration::from_secs(2));
        let options = PollOptions::builder()
            .fetch_timeout(Duration::from_secs(1))
            .build();
        let sched = PollingScheduler::new(Arc::clone(&api), options).unwrap();
        sched.set_watch_set([s.uuid]);

        sched.poll_once().await.unwrap();
        assert!(sched.latest().is_stale(&s.uuid));
    }

    #[tokio::test]
    async fn test_unauthenticated_cycle_returns_error() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        api.set_unauthenticated(true);
        let sched = scheduler(&api, &[&s]);

        let err = sched.poll_once().await.unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(sched.latest().cycle, 0);
    }

    #[test]
    fn test_watch_set_dedups() {
        let api = Arc::new(MockApi::new());
        let sched = PollingScheduler::new(api, PollOptions::default()).unwrap();
        let id = Uuid::new_v4();
        sched.set_watch_set([id, id]);
        assert_eq!(sched.watch_set(), vec![id]);
    }

    // --- Background task ---

    #[tokio::test(start_paused = true)]
    async fn test_background_cycles() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        let mut sched = scheduler(&api, &[&s]);
        let mut rx = sched.subscribe();

        sched.start();
        assert_eq!(sched.state(), SchedulerState::Running);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().cycle, 1);

        api.set_transient_failures(s.uuid, 1).await;
        rx.changed().await.unwrap();
        {
            let snap = rx.borrow_and_update();
            assert_eq!(snap.cycle, 2);
            assert_eq!(snap.reading(&s.uuid).unwrap().value, 1.0);
        }

        api.set_latest(s.uuid, 7.0).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().reading(&s.uuid).unwrap().value, 7.0);

        sched.stop().await;
        assert_eq!(sched.state(), SchedulerState::Stopped);
        assert!(!sched.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_cycle() {
        let s = sensor("slow");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        api.set_latency(Duration::from_secs(10));
        let mut sched = scheduler(&api, &[&s]);

        sched.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(api.latest_calls(), 1);

        sched.stop().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sched.latest().cycle, 0);
        assert_eq!(api.latest_calls(), 1);
        assert_eq!(sched.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_set_change_discards_in_flight_cycle() {
        let old = sensor("old");
        let new = sensor("new");
        let api = Arc::new(
            MockApi::builder()
                .latest(old.uuid, 1.0)
                .latest(new.uuid, 2.0)
                .build(),
        );
        api.set_latency(Duration::from_secs(3));
        let mut sched = scheduler(&api, &[&old]);
        let mut rx = sched.subscribe();

        sched.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        sched.set_watch_set([new.uuid]);

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.cycle, 1);
        assert!(snap.reading(&old.uuid).is_none());
        assert_eq!(snap.reading(&new.uuid).unwrap().value, 2.0);

        sched.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_stops_scheduler() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        let mut sched = scheduler(&api, &[&s]);
        let mut state = sched.subscribe_state();

        sched.start();
        api.set_unauthenticated(true);
        state
            .wait_for(|s| *s == SchedulerState::Unauthenticated)
            .await
            .unwrap();
        assert_eq!(api.latest_calls(), 1);

        sched.stop().await;
        assert_eq!(sched.state(), SchedulerState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let s = sensor("boiler");
        let api = Arc::new(MockApi::builder().latest(s.uuid, 1.0).build());
        let mut sched = scheduler(&api, &[&s]);
        let mut rx = sched.subscribe();

        sched.start();
        sched.start();
        rx.changed().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(api.latest_calls(), 1);
        sched.stop().await;
    }
}
