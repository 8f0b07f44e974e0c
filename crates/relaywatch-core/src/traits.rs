//! Trait abstraction for the telemetry service.
//!
//! This module provides the [`TelemetryApi`] trait that abstracts over the
//! remote request/response service and the in-memory [`MockApi`](crate::MockApi)
//! used in tests.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use relaywatch_types::{ControlMode, Controller, Reading, Relay, Sensor, User};

use crate::error::Result;

/// Operations the engine consumes from the system of record.
///
/// Implementations are responsible for normalising payloads at the boundary:
/// readings must carry finite values and ranged results must be ordered by
/// timestamp ascending.
///
/// # Example
///
/// ```ignore
/// use relaywatch_core::{TelemetryApi, Result};
///
/// async fn print_latest<A: TelemetryApi>(api: &A) -> Result<()> {
///     for sensor in api.list_sensors().await? {
///         match api.latest_reading(sensor.uuid).await? {
///             Some(r) => println!("{}: {}", sensor.name, r.value),
///             None => println!("{}: no data", sensor.name),
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    // --- Inventory ---

    /// List all sensors visible to the session.
    async fn list_sensors(&self) -> Result<Vec<Sensor>>;

    /// List all controllers visible to the session.
    async fn list_controllers(&self) -> Result<Vec<Controller>>;

    /// List all relays visible to the session.
    async fn list_relays(&self) -> Result<Vec<Relay>>;

    // --- Readings ---

    /// Most recent reading of a sensor, or `None` if it has never reported.
    async fn latest_reading(&self, sensor_uuid: Uuid) -> Result<Option<Reading>>;

    /// Readings of a sensor between two instants, ordered ascending.
    ///
    /// An empty vector is a valid answer and distinct from an error.
    async fn readings_in_range(
        &self,
        sensor_uuid: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Reading>>;

    // --- Commands ---

    /// Switch a relay on or off. `Ok(())` is the server's acknowledgement.
    async fn set_relay_state(
        &self,
        controller_uuid: Uuid,
        relay_uuid: Uuid,
        desired_state: bool,
    ) -> Result<()>;

    /// Change a controller's control mode, returning the updated controller.
    async fn set_controller_mode(&self, controller_id: u64, mode: ControlMode)
    -> Result<Controller>;

    // --- Session ---

    /// The authenticated account, or [`Error::Unauthenticated`](crate::Error::Unauthenticated).
    async fn current_user(&self) -> Result<User>;
}
