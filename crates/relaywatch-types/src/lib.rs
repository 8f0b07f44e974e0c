//! Platform-agnostic types for relaywatch.
//!
//! This crate provides the data model shared by the monitoring engine
//! (relaywatch-core) and its front ends.
//!
//! # Features
//!
//! - Sensors, readings and their severity classification
//! - Relays and controllers with their control mode
//! - Validated time windows for historical queries
//! - Wire shapes (serde) matching the telemetry service payloads
//!
//! # Example
//!
//! ```
//! use relaywatch_types::{ControlMode, Severity};
//!
//! assert!(Severity::Critical > Severity::Warning);
//! assert_eq!(ControlMode::Auto.toggled(), ControlMode::Manual);
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    ControlMode, Controller, Reading, Relay, Role, Sensor, SensorKind, Severity, TimeWindow, User,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    // --- TimeWindow ---

    #[test]
    fn test_window_accepts_ordered_bounds() {
        let w = TimeWindow::new(
            datetime!(2025-03-10 08:00 UTC),
            datetime!(2025-03-10 10:00 UTC),
        )
        .unwrap();
        assert_eq!(w.midpoint(), datetime!(2025-03-10 09:00 UTC));
        assert_eq!(w.duration(), time::Duration::hours(2));
    }

    #[test]
    fn test_window_accepts_empty_span() {
        let t = datetime!(2025-03-10 08:00 UTC);
        assert!(TimeWindow::new(t, t).is_ok());
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let err = TimeWindow::new(
            datetime!(2025-03-10 10:00 UTC),
            datetime!(2025-03-10 08:00 UTC),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidWindow { .. }));
    }

    #[test]
    fn test_window_edits_revalidate() {
        let w = TimeWindow::new(
            datetime!(2025-03-10 08:00 UTC),
            datetime!(2025-03-10 10:00 UTC),
        )
        .unwrap();
        assert!(w.with_from(datetime!(2025-03-10 11:00 UTC)).is_err());
        assert!(w.with_to(datetime!(2025-03-10 07:00 UTC)).is_err());
        let moved = w.with_to(datetime!(2025-03-11 00:00 UTC)).unwrap();
        assert_eq!(moved.from(), w.from());
    }

    #[test]
    fn test_window_deserialize_validates() {
        let ok = r#"{"from":"2025-03-10T08:00:00Z","to":"2025-03-10T09:00:00Z"}"#;
        assert!(serde_json::from_str::<TimeWindow>(ok).is_ok());

        let bad = r#"{"from":"2025-03-10T10:00:00Z","to":"2025-03-10T09:00:00Z"}"#;
        assert!(serde_json::from_str::<TimeWindow>(bad).is_err());
    }

    proptest! {
        #[test]
        fn prop_window_new_accepts_only_ordered_bounds(
            a in -1_000_000i64..1_000_000,
            b in -1_000_000i64..1_000_000,
        ) {
            let base = OffsetDateTime::UNIX_EPOCH;
            let (from, to) = (base + Duration::seconds(a), base + Duration::seconds(b));
            prop_assert_eq!(TimeWindow::new(from, to).is_ok(), from <= to);
        }

        #[test]
        fn prop_window_between_is_ordered(
            a in -1_000_000i64..1_000_000,
            b in -1_000_000i64..1_000_000,
        ) {
            let base = OffsetDateTime::UNIX_EPOCH;
            let w = TimeWindow::between(base + Duration::seconds(a), base + Duration::seconds(b));
            prop_assert!(w.from() <= w.to());
            prop_assert_eq!(w.duration(), Duration::seconds((a - b).abs()));
        }
    }

    // --- Severity ---

    #[test]
    fn test_severity_order() {
        assert!(Severity::Normal < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert!(!Severity::Normal.is_alert());
        assert!(Severity::Warning.is_alert());
    }

    // --- Wire shapes ---

    #[test]
    fn test_sensor_deserialize_wire_names() {
        let json = r#"{
            "uuid": "6f1c3b5e-2d4a-4c8e-9f10-1a2b3c4d5e6f",
            "name": "Boiler",
            "controller": "0b7e6c1a-9d2f-4e3b-8a5c-7d6e5f4a3b2c",
            "type": "temperature",
            "critical_min": 10.0,
            "critical_max": 90.5,
            "unit_of_measurements": "°C"
        }"#;
        let sensor: Sensor = serde_json::from_str(json).unwrap();
        assert_eq!(sensor.name, "Boiler");
        assert_eq!(sensor.kind, SensorKind::Temperature);
        assert_eq!(sensor.thresholds(), Some((10.0, 90.5)));
        assert_eq!(sensor.unit.as_deref(), Some("°C"));
    }

    #[test]
    fn test_sensor_optional_fields_default() {
        let json = r#"{
            "uuid": "6f1c3b5e-2d4a-4c8e-9f10-1a2b3c4d5e6f",
            "name": "Tank",
            "controller": "0b7e6c1a-9d2f-4e3b-8a5c-7d6e5f4a3b2c",
            "type": "level"
        }"#;
        let sensor: Sensor = serde_json::from_str(json).unwrap();
        assert_eq!(sensor.kind, SensorKind::Other);
        assert_eq!(sensor.thresholds(), None);
    }

    #[test]
    fn test_sensor_half_configured_thresholds() {
        let mut sensor = Sensor::new(Uuid::new_v4(), "half", Uuid::new_v4());
        sensor.critical_max = Some(5.0);
        assert_eq!(sensor.thresholds(), None);
    }

    #[test]
    fn test_sensor_normalize_drops_non_finite() {
        let mut sensor =
            Sensor::new(Uuid::new_v4(), "s", Uuid::new_v4()).with_thresholds(f64::NAN, 3.0);
        assert!(sensor.normalize());
        assert_eq!(sensor.critical_min, None);
        assert_eq!(sensor.critical_max, Some(3.0));
        assert!(!sensor.normalize());
    }

    #[test]
    fn test_reading_rejects_non_finite() {
        let t = datetime!(2025-03-10 08:00 UTC);
        assert!(Reading::new(Uuid::new_v4(), 1.5, t).is_ok());
        assert!(Reading::new(Uuid::new_v4(), f64::INFINITY, t).is_err());
        assert!(Reading::new(Uuid::new_v4(), f64::NAN, t).is_err());
    }

    #[test]
    fn test_controller_and_mode_wire_format() {
        let json = r#"{
            "uuid": "0b7e6c1a-9d2f-4e3b-8a5c-7d6e5f4a3b2c",
            "id": 7,
            "name": "",
            "control_mode": "AUTO"
        }"#;
        let c: Controller = serde_json::from_str(json).unwrap();
        assert_eq!(c.control_mode, ControlMode::Auto);
        assert_eq!(c.display_name(), "Unnamed");
        assert_eq!(
            serde_json::to_string(&ControlMode::Manual).unwrap(),
            "\"MANUAL\""
        );
    }

    #[test]
    fn test_control_mode_from_str() {
        assert_eq!("manual".parse::<ControlMode>().unwrap(), ControlMode::Manual);
        assert_eq!("AUTO".parse::<ControlMode>().unwrap(), ControlMode::Auto);
        assert!("sometimes".parse::<ControlMode>().is_err());
    }

    #[test]
    fn test_user_role() {
        let json = r#"{"id": 1, "email": "ops@example.com", "role": "MANAGER", "company": 3}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.company, Some(3));
    }
}
