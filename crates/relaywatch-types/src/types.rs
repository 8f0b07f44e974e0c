//! Core types for sensor telemetry and relay control.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Physical quantity a sensor measures.
///
/// Unknown kinds reported by the server are kept as [`SensorKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SensorKind {
    Temperature,
    Pressure,
    Humidity,
    #[default]
    #[cfg_attr(feature = "serde", serde(other))]
    Other,
}

/// A sensor attached to a controller.
///
/// Identity is the `uuid`. The threshold fields are owned by external
/// configuration; this crate never edits them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sensor {
    pub uuid: Uuid,
    pub name: String,
    /// UUID of the owning controller.
    #[cfg_attr(feature = "serde", serde(rename = "controller"))]
    pub controller_uuid: Uuid,
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub kind: SensorKind,
    /// Lower critical bound, if configured.
    #[cfg_attr(feature = "serde", serde(default))]
    pub critical_min: Option<f64>,
    /// Upper critical bound, if configured.
    #[cfg_attr(feature = "serde", serde(default))]
    pub critical_max: Option<f64>,
    /// Unit of measurement shown next to values.
    #[cfg_attr(feature = "serde", serde(rename = "unit_of_measurements", default))]
    pub unit: Option<String>,
}

impl Sensor {
    /// Create a sensor without thresholds or unit.
    pub fn new(uuid: Uuid, name: impl Into<String>, controller_uuid: Uuid) -> Self {
        Self {
            uuid,
            name: name.into(),
            controller_uuid,
            kind: SensorKind::Other,
            critical_min: None,
            critical_max: None,
            unit: None,
        }
    }

    /// Set both critical bounds.
    #[must_use]
    pub fn with_thresholds(mut self, critical_min: f64, critical_max: f64) -> Self {
        self.critical_min = Some(critical_min);
        self.critical_max = Some(critical_max);
        self
    }

    /// Set the unit of measurement.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Both critical bounds, when the sensor has opted in to thresholds.
    pub fn thresholds(&self) -> Option<(f64, f64)> {
        Some((self.critical_min?, self.critical_max?))
    }

    /// Drop threshold values that are not finite numbers.
    ///
    /// Returns `true` if anything was discarded.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        for bound in [&mut self.critical_min, &mut self.critical_max] {
            if bound.is_some_and(|v| !v.is_finite()) {
                *bound = None;
                changed = true;
            }
        }
        changed
    }
}

/// A single measurement produced by a sensor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    pub sensor_uuid: Uuid,
    pub value: f64,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
}

impl Reading {
    /// Create a reading, rejecting values that are not finite.
    pub fn new(sensor_uuid: Uuid, value: f64, timestamp: OffsetDateTime) -> Result<Self> {
        let reading = Self {
            sensor_uuid,
            value,
            timestamp,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Check that the value is a finite number.
    pub fn validate(&self) -> Result<()> {
        if self.value.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidValue(format!(
                "reading for sensor {} has non-finite value {}",
                self.sensor_uuid, self.value
            )))
        }
    }
}

/// Classification of a reading against its sensor's critical bounds.
///
/// Ordered `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    /// Whether this severity belongs in the alert set.
    pub fn is_alert(self) -> bool {
        self != Severity::Normal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span of time with `from <= to`.
///
/// The fields are private so that every construction and edit path goes
/// through validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawWindow", into = "RawWindow"))]
pub struct TimeWindow {
    from: OffsetDateTime,
    to: OffsetDateTime,
}

impl TimeWindow {
    /// Create a window, failing if `from` is after `to`.
    pub fn new(from: OffsetDateTime, to: OffsetDateTime) -> Result<Self> {
        if from <= to {
            Ok(Self { from, to })
        } else {
            Err(Error::InvalidWindow { from, to })
        }
    }

    /// Create the window spanning two instants given in either order.
    pub fn between(a: OffsetDateTime, b: OffsetDateTime) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }

    pub fn from(&self) -> OffsetDateTime {
        self.from
    }

    pub fn to(&self) -> OffsetDateTime {
        self.to
    }

    /// Length of the window.
    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// Instant halfway between the bounds.
    pub fn midpoint(&self) -> OffsetDateTime {
        self.from + self.duration() / 2
    }

    /// Copy of this window with a new start.
    pub fn with_from(&self, from: OffsetDateTime) -> Result<Self> {
        Self::new(from, self.to)
    }

    /// Copy of this window with a new end.
    pub fn with_to(&self, to: OffsetDateTime) -> Result<Self> {
        Self::new(self.from, to)
    }
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RawWindow {
    #[serde(with = "time::serde::rfc3339")]
    from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    to: OffsetDateTime,
}

#[cfg(feature = "serde")]
impl TryFrom<RawWindow> for TimeWindow {
    type Error = Error;

    fn try_from(raw: RawWindow) -> Result<Self> {
        TimeWindow::new(raw.from, raw.to)
    }
}

#[cfg(feature = "serde")]
impl From<TimeWindow> for RawWindow {
    fn from(window: TimeWindow) -> Self {
        RawWindow {
            from: window.from,
            to: window.to,
        }
    }
}

/// A relay output on a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Relay {
    pub uuid: Uuid,
    pub name: String,
    /// Numeric id of the owning controller.
    #[cfg_attr(feature = "serde", serde(rename = "controller"))]
    pub controller_id: u64,
    pub is_working: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
}

/// Who actuates a controller's relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ControlMode {
    /// Relays follow direct user commands.
    Manual,
    /// An automatic process owns relay actuation.
    Auto,
}

impl ControlMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            ControlMode::Manual => ControlMode::Auto,
            ControlMode::Auto => ControlMode::Manual,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlMode::Manual => "MANUAL",
            ControlMode::Auto => "AUTO",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(ControlMode::Manual),
            "auto" | "automatic" => Ok(ControlMode::Auto),
            other => Err(Error::InvalidValue(format!("unknown control mode '{}'", other))),
        }
    }
}

/// A remote controller hosting sensors and relays.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Controller {
    pub uuid: Uuid,
    pub id: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    pub control_mode: ControlMode,
}

impl Controller {
    /// Name for display, with a placeholder for unnamed controllers.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unnamed"
        } else {
            &self.name
        }
    }
}

/// Account role reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Role {
    Superuser,
    Manager,
    Employee,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Superuser => "SUPERUSER",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
        })
    }
}

/// The authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct User {
    pub id: u64,
    pub email: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub first_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub last_name: String,
    pub role: Role,
    /// Company the account belongs to; superusers may have none.
    #[cfg_attr(feature = "serde", serde(default))]
    pub company: Option<u64>,
}
