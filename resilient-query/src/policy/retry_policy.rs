//! Retry policy value object.

use super::classifier::{ErrorClassifier, DEFAULT_RETRYABLE_SIGNATURES};
use super::JitterStrategy;
use crate::errors::PolicyError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for retry behavior.
///
/// Durations serialize as integer milliseconds (`initial_delay_ms`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Delay cap.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Wall-clock bound on a single attempt.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Case-insensitive substrings marking a failure as transient.
    pub retryable_signatures: Vec<String>,
    /// Jitter applied to the backoff schedule.
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            timeout: Duration::from_millis(30_000),
            retryable_signatures: DEFAULT_RETRYABLE_SIGNATURES
                .iter()
                .map(ToString::to_string)
                .collect(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the retryable signature set.
    #[must_use]
    pub fn with_retryable_signatures<I, S>(mut self, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_signatures = signatures.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one signature to the existing set.
    #[must_use]
    pub fn with_retryable_signature(mut self, signature: impl Into<String>) -> Self {
        self.retryable_signatures.push(signature.into());
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts this policy allows, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Builds the classifier for this policy's signatures.
    #[must_use]
    pub fn classifier(&self) -> ErrorClassifier {
        ErrorClassifier::new(&self.retryable_signatures)
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.initial_delay > self.max_delay {
            return Err(PolicyError::InvalidDelayRange {
                initial_ms: self.initial_delay.as_millis(),
                max_ms: self.max_delay.as_millis(),
            });
        }
        if self.timeout.is_zero() {
            return Err(PolicyError::ZeroTimeout);
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(10_000));
        assert_eq!(policy.timeout, Duration::from_millis(30_000));
        assert_eq!(policy.jitter, JitterStrategy::None);
        assert_eq!(policy.retryable_signatures.len(), DEFAULT_RETRYABLE_SIGNATURES.len());
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::new()
            .with_max_retries(5)
            .with_initial_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_millis(500))
            .with_timeout(Duration::from_secs(2))
            .with_retryable_signatures(["503"])
            .with_retryable_signature("overloaded")
            .with_jitter(JitterStrategy::Equal);

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.timeout, Duration::from_secs(2));
        assert_eq!(policy.retryable_signatures, vec!["503", "overloaded"]);
        assert_eq!(policy.jitter, JitterStrategy::Equal);
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(2000))
            .with_max_delay(Duration::from_millis(1000));

        assert_eq!(
            policy.validate(),
            Err(PolicyError::InvalidDelayRange {
                initial_ms: 2000,
                max_ms: 1000
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let policy = RetryPolicy::new().with_timeout(Duration::ZERO);
        assert_eq!(policy.validate(), Err(PolicyError::ZeroTimeout));
        assert!(RetryPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_policy_serde_uses_millis() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_retries": 1, "timeout_ms": 250}"#).unwrap();

        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.timeout, Duration::from_millis(250));
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));

        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["timeout_ms"], 250);
        assert_eq!(json["jitter"], "none");
    }
}
