//! Error types for relaywatch-core.
//!
//! This module defines the errors that can occur while polling sensors,
//! loading history and issuing relay or mode commands.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Timeout`] | Retry on next cycle | Slow or congested service |
//! | [`Error::Transport`] | Retry on next cycle | Connection dropped or refused |
//! | [`Error::Api`] | Surface to user | Server refused the request |
//! | [`Error::Unauthenticated`] | End the session | Credentials expired or missing |
//! | [`Error::InvalidPayload`] | Do not retry | Server sent malformed data |
//! | [`Error::Rejected`] | Do not retry | Command flow refused the request locally |
//! | [`Error::NotFound`] | Refresh caches | Entity vanished from the server |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! The polling scheduler isolates per-sensor failures: a failed fetch keeps
//! the sensor's previous value and never aborts the cycle. An
//! [`Error::Unauthenticated`] result stops the scheduler instead, since the
//! session has to be re-established before any further call can succeed.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the monitoring and command engine.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The service rejected our credentials.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP-style status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The service could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP client error.
    #[cfg(feature = "http-client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned a payload that violates the data model.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A referenced entity is not known.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up.
        kind: EntityKind,
        /// The identifier that was looked up.
        id: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// A command flow refused the request without contacting the service.
    #[error("Command rejected: {0}")]
    Rejected(RejectReason),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A value violated a data-model invariant.
    #[error(transparent)]
    Types(#[from] relaywatch_types::Error),
}

/// Kinds of entity the engine looks up by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Sensor,
    Relay,
    Controller,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sensor => write!(f, "Sensor"),
            Self::Relay => write!(f, "Relay"),
            Self::Controller => write!(f, "Controller"),
        }
    }
}

/// Reasons a command flow refuses a proposal or confirmation.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RejectReason {
    /// Another proposal has not resolved yet.
    CommandPending,
    /// Nothing is awaiting confirmation.
    NothingPending,
    /// The relay's controller is in automatic mode.
    AutoMode { controller_id: u64 },
    /// The relay is not in the local cache.
    UnknownRelay(Uuid),
    /// The controller is not in the local cache.
    UnknownController(u64),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CommandPending => write!(f, "another command is awaiting resolution"),
            Self::NothingPending => write!(f, "no command is awaiting confirmation"),
            Self::AutoMode { controller_id } => {
                write!(f, "controller {} is in automatic mode", controller_id)
            }
            Self::UnknownRelay(uuid) => write!(f, "relay {} is not known", uuid),
            Self::UnknownController(id) => write!(f, "controller {} is not known", id),
        }
    }
}

impl Error {
    /// Create a not found error.
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error means the session has to be re-established.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Whether the same call may succeed if attempted again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            #[cfg(feature = "http-client")]
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias using relaywatch-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Unauthenticated;
        assert_eq!(err.to_string(), "Not authenticated");

        let err = Error::api(503, "maintenance");
        assert_eq!(err.to_string(), "API error (503): maintenance");

        let err = Error::timeout("latest_reading", Duration::from_secs(3));
        assert!(err.to_string().contains("latest_reading"));
        assert!(err.to_string().contains("3s"));

        let err = Error::not_found(EntityKind::Controller, 12);
        assert_eq!(err.to_string(), "Controller not found: 12");
    }

    #[test]
    fn test_reject_reason_display() {
        let err = Error::Rejected(RejectReason::AutoMode { controller_id: 4 });
        assert!(err.to_string().contains("controller 4 is in automatic mode"));

        let err = Error::Rejected(RejectReason::NothingPending);
        assert!(err.to_string().contains("no command"));
    }

    #[test]
    fn test_classification() {
        assert!(Error::Unauthenticated.is_auth_failure());
        assert!(!Error::Unauthenticated.is_retryable());
        assert!(Error::Transport("reset".into()).is_retryable());
        assert!(Error::api(502, "bad gateway").is_retryable());
        assert!(!Error::api(400, "bad request").is_retryable());
        assert!(!Error::Rejected(RejectReason::CommandPending).is_retryable());
    }

    #[test]
    fn test_types_error_conversion() {
        let err: Error = relaywatch_types::Error::InvalidValue("nan".into()).into();
        assert!(matches!(err, Error::Types(_)));
        assert!(err.to_string().contains("nan"));
    }
}
