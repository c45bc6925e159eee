//! Per-attempt records and listeners.

use crate::errors::Failure;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// What happened to a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The attempt produced a value.
    Succeeded,
    /// The attempt failed transiently and another attempt follows after `next_delay`.
    Retrying {
        /// The failure observed.
        failure: Failure,
        /// Backoff before the next attempt.
        next_delay: Duration,
    },
    /// The attempt failed transiently but no budget remains.
    Exhausted {
        /// The failure observed.
        failure: Failure,
    },
    /// The attempt failed with a non-retryable failure.
    Terminal {
        /// The failure observed.
        failure: Failure,
    },
    /// The execution was cancelled during the attempt.
    Cancelled {
        /// The cancellation failure.
        failure: Failure,
    },
}

impl AttemptOutcome {
    /// Returns the failure carried by this outcome, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Succeeded => None,
            Self::Retrying { failure, .. }
            | Self::Exhausted { failure }
            | Self::Terminal { failure }
            | Self::Cancelled { failure } => Some(failure),
        }
    }

    /// Returns true if no further attempt follows.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Retrying { .. })
    }
}

/// Ephemeral record of one attempt within an execution.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// Identifies the `execute` call this attempt belongs to.
    pub execution_id: Uuid,
    /// Attempt index, starting at 0.
    pub attempt: u32,
    /// Attempts allowed by the policy.
    pub max_attempts: u32,
    /// Backoff slept before this attempt.
    pub delay_before: Duration,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the attempt.
    pub elapsed: Duration,
    /// The attempt's outcome.
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Receives attempt records as an execution progresses.
pub trait AttemptListener: Send + Sync {
    /// Called once per attempt, after it settles.
    fn on_attempt(&self, record: &AttemptRecord);
}

/// Discards all records.
///
/// Used as the default when no listener is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAttemptListener;

impl AttemptListener for NoOpAttemptListener {
    fn on_attempt(&self, _record: &AttemptRecord) {}
}

/// Logs every record at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAttemptListener;

impl AttemptListener for LoggingAttemptListener {
    fn on_attempt(&self, record: &AttemptRecord) {
        debug!(
            execution_id = %record.execution_id,
            attempt = record.attempt + 1,
            max_attempts = record.max_attempts,
            delay_before_ms = record.delay_before.as_millis() as u64,
            elapsed_ms = record.elapsed.as_millis() as u64,
            outcome = ?record.outcome,
            "Attempt settled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord {
            execution_id: Uuid::new_v4(),
            attempt: 1,
            max_attempts: 4,
            delay_before: Duration::from_millis(1000),
            started_at: Utc::now(),
            elapsed: Duration::from_millis(12),
            outcome,
        }
    }

    #[test]
    fn test_outcome_failure_and_finality() {
        let failure = Failure::new("ECONNRESET");
        let retrying = AttemptOutcome::Retrying {
            failure: failure.clone(),
            next_delay: Duration::from_millis(200),
        };
        assert_eq!(retrying.failure(), Some(&failure));
        assert!(!retrying.is_final());

        assert!(AttemptOutcome::Succeeded.failure().is_none());
        assert!(AttemptOutcome::Succeeded.is_final());
        assert!(AttemptOutcome::Terminal { failure }.is_final());
    }

    #[test]
    fn test_record_serializes_outcome_inline() {
        let json = serde_json::to_value(record(AttemptOutcome::Terminal {
            failure: Failure::new("permission denied").with_code("42501"),
        }))
        .unwrap();

        assert_eq!(json["outcome"], "terminal");
        assert_eq!(json["failure"]["code"], "42501");
        assert_eq!(json["attempt"], 1);
    }

    #[test]
    fn test_listeners_accept_records() {
        let rec = record(AttemptOutcome::Succeeded);
        NoOpAttemptListener.on_attempt(&rec);
        LoggingAttemptListener.on_attempt(&rec);
    }
}
