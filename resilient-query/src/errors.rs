//! Error types for resilient-query.
//!
//! [`Failure`] is the only runtime error the executor hands back to callers.
//! [`PolicyError`] and [`ConfigError`] cover invalid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Code attached to failures produced by cancellation.
pub const CANCELLED_CODE: &str = "CANCELLED";

/// Code attached to failures produced by a panicking operation.
pub const PANIC_CODE: &str = "PANIC";

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Reported by the remote operation itself.
    #[default]
    Remote,
    /// Synthesized by the timeout racer.
    Timeout,
    /// Synthesized when the caller's token was cancelled.
    Cancelled,
    /// The operation panicked while being polled.
    Panicked,
}

/// An immutable description of a failed operation attempt.
///
/// Carries the fields a PostgREST-style backend reports (`message`, `code`,
/// `details`, `hint`). Whether the failure is transient is not stored here;
/// it is derived by [`ErrorClassifier`](crate::policy::ErrorClassifier).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Failure {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(default)]
    kind: FailureKind,
}

impl Failure {
    /// Creates a remote failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
            hint: None,
            kind: FailureKind::Remote,
        }
    }

    /// Creates the failure reported when an attempt exceeds its timeout.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            ..Self::new(format!("Request timeout after {}ms", timeout.as_millis()))
        }
    }

    /// Creates the failure reported when the caller cancels an execution.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            ..Self::new(format!("Operation cancelled: {}", reason.into())).with_code(CANCELLED_CODE)
        }
    }

    /// Creates the failure reported when an operation panics.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panicked,
            ..Self::new(format!("Operation panicked: {}", message.into())).with_code(PANIC_CODE)
        }
    }

    /// Builds a failure from an I/O error, mapping socket error kinds onto the
    /// errno-style codes network stacks report.
    #[must_use]
    pub fn from_io_error(err: &io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
            io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
            io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
            io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
            _ => None,
        };

        let failure = Self::new(err.to_string());
        match code {
            Some(code) => failure.with_code(code),
            None => failure,
        }
    }

    /// Sets the machine-readable code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the details string.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Sets the hint string.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the machine-readable code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the details string, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns the hint string, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Returns where the failure came from.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Returns true if the failure was synthesized by the timeout racer.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }

    /// Returns true if the failure was caused by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("kind".to_string(), serde_json::json!(self.kind));

        if let Some(ref code) = self.code {
            map.insert("code".to_string(), serde_json::json!(code));
        }
        if let Some(ref details) = self.details {
            map.insert("details".to_string(), serde_json::json!(details));
        }
        if let Some(ref hint) = self.hint {
            map.insert("hint".to_string(), serde_json::json!(hint));
        }

        map
    }
}

impl From<io::Error> for Failure {
    fn from(err: io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Error raised when a [`RetryPolicy`](crate::policy::RetryPolicy) is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The initial delay is larger than the delay cap.
    #[error("initial delay ({initial_ms}ms) exceeds max delay ({max_ms}ms)")]
    InvalidDelayRange {
        /// Initial delay in milliseconds.
        initial_ms: u128,
        /// Maximum delay in milliseconds.
        max_ms: u128,
    },

    /// A zero timeout would fail every attempt immediately.
    #[error("attempt timeout must be greater than zero")]
    ZeroTimeout,
}

/// Error raised while loading or validating a [`LoaderConfig`](crate::config::LoaderConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The embedded retry policy is invalid.
    #[error("{0}")]
    Policy(#[from] PolicyError),

    /// The parallel runner needs at least one slot.
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    /// The health gate would re-probe without pausing.
    #[error("health_poll_interval_ms must be greater than 0")]
    ZeroPollInterval,

    /// An environment override could not be parsed.
    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv {
        /// The environment variable name.
        key: String,
        /// The raw value found.
        value: String,
    },

    /// The configuration document could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
