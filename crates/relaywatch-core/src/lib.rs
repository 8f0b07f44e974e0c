//! Telemetry monitoring, alerting and relay command engine.
//!
//! This crate polls the latest values of remote sensors, classifies them
//! against per-sensor critical bounds, maintains the live alert set, resolves
//! time windows for historical charts, and runs the confirmed command flows
//! for relays and controller modes.
//!
//! # Features
//!
//! - **Polling**: concurrent refresh of every watched sensor on a fixed
//!   interval, with per-sensor failure isolation and cancellation
//! - **Alerts**: WARNING/CRITICAL classification with a 20% margin band
//! - **Time windows**: calendar and rolling presets, validated bound edits,
//!   evenly spaced axis ticks
//! - **History**: concurrent multi-sensor range queries that discard
//!   superseded loads
//! - **Commands**: propose / confirm / cancel flows for relay toggles and
//!   mode switches; automatic mode makes relays inert
//! - **Testing**: an in-memory [`MockApi`] with failure injection
//!
//! The service itself is abstracted by the [`TelemetryApi`] trait. Enable the
//! `http-client` feature for [`HttpApi`], its REST implementation.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use relaywatch_core::{AlertAggregator, MockApi, PollOptions, PollingScheduler};
//! use relaywatch_types::{Sensor, Severity};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> relaywatch_core::Result<()> {
//!     let sensor = Sensor::new(Uuid::new_v4(), "Boiler", Uuid::new_v4())
//!         .with_thresholds(10.0, 20.0);
//!     let api = Arc::new(MockApi::builder().sensor(sensor.clone()).latest(sensor.uuid, 19.0).build());
//!
//!     let scheduler = PollingScheduler::new(api, PollOptions::default())?;
//!     scheduler.set_watch_set([sensor.uuid]);
//!     scheduler.poll_once().await?;
//!
//!     let mut alerts = AlertAggregator::new();
//!     let snapshot = scheduler.latest();
//!     let entries = alerts.update(&[sensor], &snapshot.readings);
//!     assert_eq!(entries[0].severity, Severity::Warning);
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod commands;
pub mod error;
pub mod history;
pub mod mock;
pub mod mode;
pub mod polling;
pub mod relay;
#[cfg(feature = "http-client")]
pub mod service_client;
pub mod session;
pub mod thresholds;
pub mod ticks;
pub mod traits;
pub mod window;

// Re-export the data model
pub use relaywatch_types as types;
pub use relaywatch_types::{
    ControlMode, Controller, Reading, Relay, Role, Sensor, SensorKind, Severity, TimeWindow, User,
};

// Core exports
pub use alerts::{AlertAggregator, AlertEntry};
pub use commands::{Applied, CommandOutcome, ControlPanel, FlowState, PendingCommand};
pub use error::{EntityKind, Error, RejectReason, Result};
pub use history::{HistoryLoad, HistoryLoader};
pub use mock::{MockApi, MockApiBuilder, RelayCommand};
pub use mode::{ControllerModeFlow, ModeProposal};
pub use polling::{PollOptions, PollOptionsBuilder, PollingScheduler, SchedulerState, Snapshot};
pub use relay::{ControllerLookup, RelayCommandFlow, RelayProposal};
#[cfg(feature = "http-client")]
pub use service_client::HttpApi;
pub use session::Session;
pub use thresholds::{WARNING_MARGIN, classify};
pub use ticks::ticks;
pub use traits::TelemetryApi;
pub use window::{Preset, WindowSelection, resolve};
