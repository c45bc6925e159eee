//! Backoff schedule between retry attempts.

use super::RetryPolicy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter strategy applied on top of the exponential schedule.
///
/// The default is `None`, which keeps retry timing reproducible. Concurrent
/// callers that fail together retry together under `None`; `Full` or `Equal`
/// spread them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay.
    #[must_use]
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

        match self {
            Self::None => delay,
            Self::Full => {
                if millis == 0 {
                    delay
                } else {
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                }
            }
            Self::Equal => {
                let half = millis / 2;
                if half == 0 {
                    delay
                } else {
                    Duration::from_millis(half + rand::thread_rng().gen_range(0..=half))
                }
            }
        }
    }
}

/// Computes `min(initial * 2^attempt_index, max)` without overflowing.
#[must_use]
pub fn exponential_delay(attempt_index: u32, initial: Duration, max: Duration) -> Duration {
    2u32.checked_pow(attempt_index)
        .and_then(|factor| initial.checked_mul(factor))
        .map_or(max, |delay| delay.min(max))
}

/// Returns the delay to sleep after attempt `attempt_index` fails.
///
/// `attempt_index` is 0 for the delay before the first retry.
#[must_use]
pub fn delay_for(attempt_index: u32, policy: &RetryPolicy) -> Duration {
    let delay = exponential_delay(attempt_index, policy.initial_delay, policy.max_delay);
    policy.jitter.apply(delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(initial_ms))
            .with_max_delay(Duration::from_millis(max_ms))
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(delay_for(0, &policy), Duration::from_millis(1000));
        assert_eq!(delay_for(1, &policy), Duration::from_millis(2000));
        assert_eq!(delay_for(2, &policy), Duration::from_millis(4000));
        assert_eq!(delay_for(3, &policy), Duration::from_millis(8000));
        assert_eq!(delay_for(4, &policy), Duration::from_millis(10_000));
    }

    #[test]
    fn test_schedule_matches_formula_and_is_capped() {
        let policy = policy(100, 1000);
        for i in 0..40u32 {
            let expected = Duration::from_millis(100u64.saturating_mul(1u64 << i.min(30)))
                .min(Duration::from_millis(1000));
            assert_eq!(delay_for(i, &policy), expected, "attempt index {i}");
        }
    }

    #[test]
    fn test_huge_attempt_index_saturates_to_max() {
        let policy = policy(1000, 10_000);
        assert_eq!(delay_for(u32::MAX, &policy), Duration::from_millis(10_000));
        assert_eq!(delay_for(64, &policy), Duration::from_millis(10_000));
    }

    #[test]
    fn test_schedule_is_deterministic() {
        let policy = policy(250, 5000);
        let first: Vec<_> = (0..8).map(|i| delay_for(i, &policy)).collect();
        let second: Vec<_> = (0..8).map(|i| delay_for(i, &policy)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_initial_delay() {
        let policy = policy(0, 1000);
        assert_eq!(delay_for(5, &policy), Duration::ZERO);
    }

    #[test]
    fn test_full_jitter_bounds() {
        let jitter = JitterStrategy::Full;
        let delay = Duration::from_millis(400);
        for _ in 0..100 {
            assert!(jitter.apply(delay) <= delay);
        }
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let jitter = JitterStrategy::Equal;
        let delay = Duration::from_millis(400);
        for _ in 0..100 {
            let jittered = jitter.apply(delay);
            assert!(jittered >= Duration::from_millis(200));
            assert!(jittered <= delay);
        }
    }
}
