//! Loader configuration.
//!
//! Bundles the retry policy with the parallel-runner and health-gate knobs
//! so the whole executor stack can be built from one serde document or from
//! environment overrides.

use crate::errors::ConfigError;
use crate::executor::{ParallelRunner, RetryExecutor, DEFAULT_HEALTH_WAIT, DEFAULT_MAX_CONCURRENCY};
use crate::health::{HealthGate, HealthProbe, DEFAULT_POLL_INTERVAL};
use crate::policy::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "RESILIENT_QUERY_";

/// Configuration for the executor stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Retry policy applied to every operation.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Cap on simultaneously running batch operations.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// How long the health gate may wait before the first attempt.
    #[serde(default = "default_health_wait_ms")]
    pub health_wait_ms: u64,
    /// Interval between health probes.
    #[serde(default = "default_health_poll_interval_ms")]
    pub health_poll_interval_ms: u64,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_health_wait_ms() -> u64 {
    DEFAULT_HEALTH_WAIT.as_millis() as u64
}

fn default_health_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrency: default_max_concurrency(),
            health_wait_ms: default_health_wait_ms(),
            health_poll_interval_ms: default_health_poll_interval_ms(),
        }
    }
}

impl LoaderConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `RESILIENT_QUERY_*` overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Recognised keys: `MAX_RETRIES`, `INITIAL_DELAY_MS`, `MAX_DELAY_MS`,
    /// `TIMEOUT_MS` and `MAX_CONCURRENCY`, each with [`ENV_PREFIX`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(retries) = parse_override::<u32, _>(&lookup, "MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = parse_override::<u64, _>(&lookup, "INITIAL_DELAY_MS")? {
            config.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_override::<u64, _>(&lookup, "MAX_DELAY_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_override::<u64, _>(&lookup, "TIMEOUT_MS")? {
            config.retry.timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = parse_override::<usize, _>(&lookup, "MAX_CONCURRENCY")? {
            config.max_concurrency = limit;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the policy, the concurrency cap and the poll interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.health_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Returns the health wait as a duration.
    #[must_use]
    pub fn health_wait(&self) -> Duration {
        Duration::from_millis(self.health_wait_ms)
    }

    /// Returns the health poll interval as a duration.
    #[must_use]
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    /// Builds a health gate over `probe` using the configured interval.
    #[must_use]
    pub fn health_gate(&self, probe: Arc<dyn HealthProbe>) -> HealthGate {
        HealthGate::from_arc(probe).with_poll_interval(self.health_poll_interval())
    }

    /// Builds an executor with the configured policy and health wait.
    pub fn build_executor(&self) -> Result<RetryExecutor, ConfigError> {
        self.validate()?;
        Ok(RetryExecutor::new()
            .with_policy(self.retry.clone())
            .with_health_wait(self.health_wait()))
    }

    /// Builds a parallel runner around [`build_executor`](Self::build_executor).
    pub fn build_runner(&self) -> Result<ParallelRunner, ConfigError> {
        let executor = self.build_executor()?;
        let limit = NonZeroUsize::new(self.max_concurrency).ok_or(ConfigError::ZeroConcurrency)?;
        Ok(ParallelRunner::new(executor).with_max_concurrency(limit))
    }
}

fn parse_override<T, F>(lookup: &F, suffix: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.health_wait(), Duration::from_millis(5000));
        assert_eq!(config.health_poll_interval(), Duration::from_millis(500));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_from_json_partial_document() {
        let config = LoaderConfig::from_json_str(
            r#"{"retry": {"max_retries": 1, "timeout_ms": 2000}, "max_concurrency": 2}"#,
        )
        .unwrap();

        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.timeout, Duration::from_millis(2000));
        assert_eq!(config.retry.max_delay, Duration::from_millis(10_000));
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.health_wait_ms, 5000);
    }

    #[test]
    fn test_from_json_rejects_invalid_policy() {
        let err = LoaderConfig::from_json_str(
            r#"{"retry": {"initial_delay_ms": 5000, "max_delay_ms": 100}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));

        let err = LoaderConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Serialization(_)));
    }

    #[test]
    fn test_env_overrides() {
        let config = LoaderConfig::from_lookup(lookup_from(&[
            ("RESILIENT_QUERY_MAX_RETRIES", "6"),
            ("RESILIENT_QUERY_INITIAL_DELAY_MS", " 250 "),
            ("RESILIENT_QUERY_TIMEOUT_MS", "1500"),
            ("RESILIENT_QUERY_MAX_CONCURRENCY", "8"),
        ]))
        .unwrap();

        assert_eq!(config.retry.max_retries, 6);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.retry.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_concurrency, 8);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let err =
            LoaderConfig::from_lookup(lookup_from(&[("RESILIENT_QUERY_MAX_RETRIES", "lots")])).unwrap_err();
        match err {
            ConfigError::InvalidEnv { key, value } => {
                assert_eq!(key, "RESILIENT_QUERY_MAX_RETRIES");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err =
            LoaderConfig::from_lookup(lookup_from(&[("RESILIENT_QUERY_MAX_CONCURRENCY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroConcurrency));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = LoaderConfig::from_json_str(r#"{"health_poll_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPollInterval));

        let config = LoaderConfig {
            health_poll_interval_ms: 0,
            ..LoaderConfig::default()
        };
        assert!(matches!(config.build_executor(), Err(ConfigError::ZeroPollInterval)));
    }

    #[test]
    fn test_build_runner() {
        let config = LoaderConfig {
            max_concurrency: 3,
            ..LoaderConfig::default()
        };
        let runner = config.build_runner().unwrap();
        assert_eq!(runner.max_concurrency().get(), 3);
        assert_eq!(runner.executor().policy(), &config.retry);
    }

    #[test]
    fn test_health_gate_uses_configured_interval() {
        let config = LoaderConfig {
            health_poll_interval_ms: 250,
            ..LoaderConfig::default()
        };
        let gate = config.health_gate(Arc::new(crate::health::AlwaysHealthy));
        assert_eq!(gate.poll_interval(), Duration::from_millis(250));
    }
}
