//! In-memory telemetry service for testing.
//!
//! This module provides a mock implementation of [`TelemetryApi`] that can be
//! used for unit testing without a running service.
//!
//! # Features
//!
//! - **Failure injection**: fail a sensor's fetches permanently or for the
//!   next `n` calls, fail commands, or drop the session
//! - **Latency simulation**: delay every call to exercise cancellation and
//!   overlapping-cycle behaviour
//! - **Command log**: inspect which relay and mode commands reached the service

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use relaywatch_types::{ControlMode, Controller, Reading, Relay, Role, Sensor, User};

use crate::error::{EntityKind, Error, Result};
use crate::traits::TelemetryApi;

/// A relay command that reached the mock service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCommand {
    pub controller_uuid: Uuid,
    pub relay_uuid: Uuid,
    pub desired_state: bool,
}

/// A mock telemetry service.
///
/// Implements [`TelemetryApi`] for use in generic code and testing. Successful
/// commands update the mock's own records, as the real system of record would.
///
/// # Example
///
/// ```
/// use relaywatch_core::{MockApi, TelemetryApi};
/// use relaywatch_types::Sensor;
/// use uuid::Uuid;
///
/// #[tokio::main]
/// async fn main() {
///     let sensor = Sensor::new(Uuid::new_v4(), "Boiler", Uuid::new_v4());
///     let api = MockApi::builder().sensor(sensor).build();
///     assert_eq!(api.list_sensors().await.unwrap().len(), 1);
/// }
/// ```
pub struct MockApi {
    sensors: RwLock<Vec<Sensor>>,
    controllers: RwLock<Vec<Controller>>,
    relays: RwLock<Vec<Relay>>,
    latest: RwLock<HashMap<Uuid, Reading>>,
    history: RwLock<HashMap<Uuid, Vec<Reading>>>,
    user: RwLock<Option<User>>,
    /// Sensors whose fetches always fail.
    failing_sensors: RwLock<HashSet<Uuid>>,
    /// Per-sensor count of fetches that fail before succeeding again.
    transient_failures: RwLock<HashMap<Uuid, u32>>,
    /// Message returned by failing commands, if commands should fail.
    command_failure: RwLock<Option<String>>,
    unauthenticated: AtomicBool,
    /// Simulated latency in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
    latest_calls: AtomicU32,
    range_calls: AtomicU32,
    relay_commands: RwLock<Vec<RelayCommand>>,
    mode_commands: RwLock<Vec<(u64, ControlMode)>>,
}

impl std::fmt::Debug for MockApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockApi")
            .field("latest_calls", &self.latest_calls.load(Ordering::Relaxed))
            .field("range_calls", &self.range_calls.load(Ordering::Relaxed))
            .field(
                "unauthenticated",
                &self.unauthenticated.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl Default for MockApi {
    fn default() -> Self {
        MockApiBuilder::new().build()
    }
}

impl MockApi {
    /// Create an empty mock service with an authenticated employee session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for a populated mock service.
    pub fn builder() -> MockApiBuilder {
        MockApiBuilder::new()
    }

    async fn simulate_latency(&self) {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }

    fn check_session(&self) -> Result<()> {
        if self.unauthenticated.load(Ordering::Relaxed) {
            Err(Error::Unauthenticated)
        } else {
            Ok(())
        }
    }

    async fn check_sensor_fails(&self, sensor_uuid: Uuid) -> Result<()> {
        if self.failing_sensors.read().await.contains(&sensor_uuid) {
            return Err(Error::Transport(format!(
                "mock fetch failure for sensor {}",
                sensor_uuid
            )));
        }

        let mut transient = self.transient_failures.write().await;
        if let Some(remaining) = transient.get_mut(&sensor_uuid)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::Transport(format!(
                "mock transient failure for sensor {}",
                sensor_uuid
            )));
        }
        Ok(())
    }

    async fn check_command_fails(&self) -> Result<()> {
        match self.command_failure.read().await.as_ref() {
            Some(message) => Err(Error::api(500, message.clone())),
            None => Ok(()),
        }
    }

    // --- Test control methods ---

    /// Set the latest reading of a sensor.
    pub async fn set_latest(&self, sensor_uuid: Uuid, value: f64) {
        let reading = Reading {
            sensor_uuid,
            value,
            timestamp: OffsetDateTime::now_utc(),
        };
        self.latest.write().await.insert(sensor_uuid, reading);
    }

    /// Forget the latest reading of a sensor, so it reports no data.
    pub async fn clear_latest(&self, sensor_uuid: Uuid) {
        self.latest.write().await.remove(&sensor_uuid);
    }

    /// Append readings to a sensor's history.
    pub async fn add_history(&self, sensor_uuid: Uuid, readings: Vec<Reading>) {
        self.history
            .write()
            .await
            .entry(sensor_uuid)
            .or_default()
            .extend(readings);
    }

    /// Make every fetch for a sensor fail, or stop doing so.
    pub async fn set_sensor_failing(&self, sensor_uuid: Uuid, failing: bool) {
        let mut failing_sensors = self.failing_sensors.write().await;
        if failing {
            failing_sensors.insert(sensor_uuid);
        } else {
            failing_sensors.remove(&sensor_uuid);
        }
    }

    /// Make the next `count` fetches for a sensor fail.
    pub async fn set_transient_failures(&self, sensor_uuid: Uuid, count: u32) {
        self.transient_failures
            .write()
            .await
            .insert(sensor_uuid, count);
    }

    /// Make relay and mode commands fail with the given message, or succeed again.
    pub async fn set_command_failure(&self, message: Option<&str>) {
        *self.command_failure.write().await = message.map(str::to_string);
    }

    /// Expire or restore the session.
    pub fn set_unauthenticated(&self, unauthenticated: bool) {
        self.unauthenticated
            .store(unauthenticated, Ordering::Relaxed);
    }

    /// Set simulated latency for every call.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Change a controller's mode directly, as an external process would.
    pub async fn set_mode_external(&self, controller_id: u64, mode: ControlMode) {
        if let Some(c) = self
            .controllers
            .write()
            .await
            .iter_mut()
            .find(|c| c.id == controller_id)
        {
            c.control_mode = mode;
        }
    }

    /// Number of `latest_reading` calls served.
    pub fn latest_calls(&self) -> u32 {
        self.latest_calls.load(Ordering::Relaxed)
    }

    /// Number of `readings_in_range` calls served.
    pub fn range_calls(&self) -> u32 {
        self.range_calls.load(Ordering::Relaxed)
    }

    /// Relay commands that reached the service, in order.
    pub async fn relay_commands(&self) -> Vec<RelayCommand> {
        self.relay_commands.read().await.clone()
    }

    /// Mode commands that reached the service, in order.
    pub async fn mode_commands(&self) -> Vec<(u64, ControlMode)> {
        self.mode_commands.read().await.clone()
    }

    /// The mock's own record of a relay.
    pub async fn relay(&self, relay_uuid: Uuid) -> Option<Relay> {
        self.relays
            .read()
            .await
            .iter()
            .find(|r| r.uuid == relay_uuid)
            .cloned()
    }
}

#[async_trait]
impl TelemetryApi for MockApi {
    async fn list_sensors(&self) -> Result<Vec<Sensor>> {
        self.simulate_latency().await;
        self.check_session()?;
        Ok(self.sensors.read().await.clone())
    }

    async fn list_controllers(&self) -> Result<Vec<Controller>> {
        self.simulate_latency().await;
        self.check_session()?;
        Ok(self.controllers.read().await.clone())
    }

    async fn list_relays(&self) -> Result<Vec<Relay>> {
        self.simulate_latency().await;
        self.check_session()?;
        Ok(self.relays.read().await.clone())
    }

    async fn latest_reading(&self, sensor_uuid: Uuid) -> Result<Option<Reading>> {
        self.latest_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        self.check_session()?;
        self.check_sensor_fails(sensor_uuid).await?;
        Ok(self.latest.read().await.get(&sensor_uuid).cloned())
    }

    async fn readings_in_range(
        &self,
        sensor_uuid: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Reading>> {
        self.range_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        self.check_session()?;
        self.check_sensor_fails(sensor_uuid).await?;

        let history = self.history.read().await;
        let mut readings: Vec<Reading> = history
            .get(&sensor_uuid)
            .map(|all| {
                all.iter()
                    .filter(|r| r.timestamp >= from && r.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    async fn set_relay_state(
        &self,
        controller_uuid: Uuid,
        relay_uuid: Uuid,
        desired_state: bool,
    ) -> Result<()> {
        self.simulate_latency().await;
        self.check_session()?;
        self.check_command_fails().await?;

        let controller_id = self
            .controllers
            .read()
            .await
            .iter()
            .find(|c| c.uuid == controller_uuid)
            .map(|c| c.id)
            .ok_or_else(|| Error::not_found(EntityKind::Controller, controller_uuid))?;

        let mut relays = self.relays.write().await;
        let relay = relays
            .iter_mut()
            .find(|r| r.uuid == relay_uuid && r.controller_id == controller_id)
            .ok_or_else(|| Error::not_found(EntityKind::Relay, relay_uuid))?;
        relay.is_working = desired_state;

        self.relay_commands.write().await.push(RelayCommand {
            controller_uuid,
            relay_uuid,
            desired_state,
        });
        Ok(())
    }

    async fn set_controller_mode(
        &self,
        controller_id: u64,
        mode: ControlMode,
    ) -> Result<Controller> {
        self.simulate_latency().await;
        self.check_session()?;
        self.check_command_fails().await?;

        let mut controllers = self.controllers.write().await;
        let controller = controllers
            .iter_mut()
            .find(|c| c.id == controller_id)
            .ok_or_else(|| Error::not_found(EntityKind::Controller, controller_id))?;
        controller.control_mode = mode;

        self.mode_commands.write().await.push((controller_id, mode));
        Ok(controller.clone())
    }

    async fn current_user(&self) -> Result<User> {
        self.simulate_latency().await;
        self.check_session()?;
        self.user.read().await.clone().ok_or(Error::Unauthenticated)
    }
}

/// Builder for creating mock services with custom inventory.
#[derive(Debug, Clone)]
pub struct MockApiBuilder {
    sensors: Vec<Sensor>,
    controllers: Vec<Controller>,
    relays: Vec<Relay>,
    latest: HashMap<Uuid, Reading>,
    user: Option<User>,
}

impl Default for MockApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApiBuilder {
    /// Create a new builder with no inventory and an employee session.
    pub fn new() -> Self {
        Self {
            sensors: Vec::new(),
            controllers: Vec::new(),
            relays: Vec::new(),
            latest: HashMap::new(),
            user: Some(User {
                id: 1,
                email: "mock@example.com".to_string(),
                first_name: "Mock".to_string(),
                last_name: "User".to_string(),
                role: Role::Employee,
                company: Some(1),
            }),
        }
    }

    /// Add a sensor.
    #[must_use]
    pub fn sensor(mut self, sensor: Sensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    /// Add a controller.
    #[must_use]
    pub fn controller(mut self, controller: Controller) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Add a relay.
    #[must_use]
    pub fn relay(mut self, relay: Relay) -> Self {
        self.relays.push(relay);
        self
    }

    /// Set the latest reading of a sensor.
    #[must_use]
    pub fn latest(mut self, sensor_uuid: Uuid, value: f64) -> Self {
        self.latest.insert(
            sensor_uuid,
            Reading {
                sensor_uuid,
                value,
                timestamp: OffsetDateTime::now_utc(),
            },
        );
        self
    }

    /// Set the session's account, or `None` for an anonymous session.
    #[must_use]
    pub fn user(mut self, user: Option<User>) -> Self {
        self.user = user;
        self
    }

    /// Build the mock service.
    #[must_use]
    pub fn build(self) -> MockApi {
        MockApi {
            sensors: RwLock::new(self.sensors),
            controllers: RwLock::new(self.controllers),
            relays: RwLock::new(self.relays),
            latest: RwLock::new(self.latest),
            history: RwLock::new(HashMap::new()),
            user: RwLock::new(self.user),
            failing_sensors: RwLock::new(HashSet::new()),
            transient_failures: RwLock::new(HashMap::new()),
            command_failure: RwLock::new(None),
            unauthenticated: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            latest_calls: AtomicU32::new(0),
            range_calls: AtomicU32::new(0),
            relay_commands: RwLock::new(Vec::new()),
            mode_commands: RwLock::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn controller(id: u64, mode: ControlMode) -> Controller {
        Controller {
            uuid: Uuid::new_v4(),
            id,
            name: format!("ctrl-{}", id),
            control_mode: mode,
        }
    }

    #[tokio::test]
    async fn test_mock_latest_reading() {
        let sensor = Sensor::new(Uuid::new_v4(), "s", Uuid::new_v4());
        let api = MockApi::builder()
            .sensor(sensor.clone())
            .latest(sensor.uuid, 4.5)
            .build();

        let reading = api.latest_reading(sensor.uuid).await.unwrap().unwrap();
        assert_eq!(reading.value, 4.5);
        assert_eq!(api.latest_calls(), 1);

        api.clear_latest(sensor.uuid).await;
        assert!(api.latest_reading(sensor.uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_transient_failures() {
        let id = Uuid::new_v4();
        let api = MockApi::builder().latest(id, 1.0).build();
        api.set_transient_failures(id, 2).await;

        assert!(api.latest_reading(id).await.is_err());
        assert!(api.latest_reading(id).await.is_err());
        assert!(api.latest_reading(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mock_permanent_failure() {
        let id = Uuid::new_v4();
        let api = MockApi::builder().latest(id, 1.0).build();
        api.set_sensor_failing(id, true).await;
        assert!(api.latest_reading(id).await.is_err());
        api.set_sensor_failing(id, false).await;
        assert!(api.latest_reading(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_range_filters_and_sorts() {
        let id = Uuid::new_v4();
        let api = MockApi::new();
        api.add_history(
            id,
            vec![
                Reading::new(id, 3.0, datetime!(2025-01-01 12:00 UTC)).unwrap(),
                Reading::new(id, 1.0, datetime!(2025-01-01 10:00 UTC)).unwrap(),
                Reading::new(id, 9.0, datetime!(2025-01-02 10:00 UTC)).unwrap(),
            ],
        )
        .await;

        let readings = api
            .readings_in_range(
                id,
                datetime!(2025-01-01 00:00 UTC),
                datetime!(2025-01-01 23:59 UTC),
            )
            .await
            .unwrap();
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);

        let empty = api
            .readings_in_range(
                Uuid::new_v4(),
                datetime!(2025-01-01 00:00 UTC),
                datetime!(2025-01-01 23:59 UTC),
            )
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_mock_relay_command_updates_record() {
        let ctrl = controller(3, ControlMode::Manual);
        let relay = Relay {
            uuid: Uuid::new_v4(),
            name: "pump".to_string(),
            controller_id: 3,
            is_working: false,
            description: None,
        };
        let api = MockApi::builder()
            .controller(ctrl.clone())
            .relay(relay.clone())
            .build();

        api.set_relay_state(ctrl.uuid, relay.uuid, true)
            .await
            .unwrap();
        assert!(api.relay(relay.uuid).await.unwrap().is_working);
        assert_eq!(api.relay_commands().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_command_failure() {
        let ctrl = controller(3, ControlMode::Manual);
        let api = MockApi::builder().controller(ctrl).build();
        api.set_command_failure(Some("relay offline")).await;

        let err = api
            .set_controller_mode(3, ControlMode::Auto)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("relay offline"));
        assert!(api.mode_commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_unauthenticated() {
        let api = MockApi::new();
        assert!(api.current_user().await.is_ok());
        api.set_unauthenticated(true);
        assert!(api.current_user().await.unwrap_err().is_auth_failure());
        assert!(api.list_sensors().await.unwrap_err().is_auth_failure());
    }

    #[tokio::test]
    async fn test_mock_anonymous_user() {
        let api = MockApi::builder().user(None).build();
        assert!(matches!(
            api.current_user().await,
            Err(Error::Unauthenticated)
        ));
    }
}
