//! Poll-until-healthy gate.

use super::{AlwaysHealthy, HealthProbe};
use crate::cancellation::CancellationToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Interval between probe attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default bound on [`HealthGate::wait_for_healthy`] for direct callers.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(10_000);

/// Polls a [`HealthProbe`] until it succeeds or a deadline passes.
#[derive(Clone)]
pub struct HealthGate {
    probe: Arc<dyn HealthProbe>,
    poll_interval: Duration,
}

impl HealthGate {
    /// Creates a gate over `probe`.
    #[must_use]
    pub fn new(probe: impl HealthProbe + 'static) -> Self {
        Self::from_arc(Arc::new(probe))
    }

    /// Creates a gate over a shared probe.
    #[must_use]
    pub fn from_arc(probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            probe,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Waits until the probe succeeds, `max_wait` elapses, or `token` is cancelled.
    ///
    /// Each probe call is bounded by the time remaining, so a hanging probe
    /// cannot hold the gate open past `max_wait`.
    pub async fn wait_for_healthy(&self, max_wait: Duration, token: &CancellationToken) -> bool {
        let start = Instant::now();
        let mut probes = 0u32;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= max_wait {
                debug!(probes, max_wait_ms = max_wait.as_millis() as u64, "Health gate timed out");
                return false;
            }

            probes += 1;
            tokio::select! {
                biased;
                () = token.cancelled() => return false,
                checked = tokio::time::timeout(max_wait - elapsed, self.probe.check()) => {
                    if matches!(checked, Ok(true)) {
                        return true;
                    }
                }
            }

            tokio::select! {
                biased;
                () = token.cancelled() => return false,
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::new(AlwaysHealthy)
    }
}

impl std::fmt::Debug for HealthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthGate")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
