//! Error types for boundary validation in relaywatch-types.

use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised when a value violates a data-model invariant.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum Error {
    /// A time window whose start lies after its end.
    #[error("Invalid time window: from {from} is after to {to}")]
    InvalidWindow {
        /// Requested start.
        from: OffsetDateTime,
        /// Requested end.
        to: OffsetDateTime,
    },

    /// A field carried a value outside its domain.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using relaywatch-types' Error type.
pub type Result<T> = std::result::Result<T, Error>;
