//! Threshold classification of sensor readings.
//!
//! A sensor opts in to alerting by configuring both `critical_min` and
//! `critical_max`. Values outside the bounds are [`Severity::Critical`];
//! values inside the bounds but within [`WARNING_MARGIN`] of either edge
//! (as a fraction of the span) are [`Severity::Warning`]; the rest are
//! [`Severity::Normal`].
//!
//! The bound check runs first, so misconfigured bounds still report values
//! outside them as critical. Without a positive span there is no warning
//! zone: a value inside such bounds is [`Severity::Normal`].
//!
//! # Example
//!
//! ```
//! use relaywatch_core::thresholds::classify;
//! use relaywatch_types::Severity;
//!
//! assert_eq!(classify(19.0, Some(10.0), Some(20.0)), Severity::Warning);
//! assert_eq!(classify(15.0, Some(10.0), Some(20.0)), Severity::Normal);
//! assert_eq!(classify(21.0, Some(10.0), Some(20.0)), Severity::Critical);
//! assert_eq!(classify(1e9, None, Some(20.0)), Severity::Normal);
//! ```

use relaywatch_types::{Reading, Sensor, Severity};

/// Fraction of the span, measured from either bound, that counts as a warning zone.
pub const WARNING_MARGIN: f64 = 0.2;

/// Classify a value against optional critical bounds.
pub fn classify(value: f64, critical_min: Option<f64>, critical_max: Option<f64>) -> Severity {
    let (Some(min), Some(max)) = (critical_min, critical_max) else {
        return Severity::Normal;
    };

    if value < min || value > max {
        return Severity::Critical;
    }

    let span = max - min;
    if span.is_nan() || span <= 0.0 {
        return Severity::Normal;
    }

    let low_margin = (value - min) / span;
    let high_margin = (max - value) / span;
    if low_margin < WARNING_MARGIN || high_margin < WARNING_MARGIN {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Classify a reading against its sensor's configured bounds.
pub fn evaluate(sensor: &Sensor, reading: &Reading) -> Severity {
    classify(reading.value, sensor.critical_min, sensor.critical_max)
}
