//! Per-operation retry loop.

use super::timeout::{cancelled_failure, with_timeout};
use crate::cancellation::CancellationToken;
use crate::errors::Failure;
use crate::health::HealthGate;
use crate::observability::{AttemptListener, AttemptOutcome, AttemptRecord, NoOpAttemptListener};
use crate::operation::Operation;
use crate::policy::{delay_for, RetryPolicy};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Pre-flight health wait used by the executor.
pub const DEFAULT_HEALTH_WAIT: Duration = Duration::from_millis(5000);

/// Runs operations with retry, per-attempt timeouts and optional health gating.
///
/// Each executor carries its own policy, gate and listener; there is no
/// process-wide state, so differently configured executors can coexist.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    health_gate: Option<HealthGate>,
    health_wait: Duration,
    listener: Arc<dyn AttemptListener>,
}

impl RetryExecutor {
    /// Creates an executor with the default policy and no health gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            health_gate: None,
            health_wait: DEFAULT_HEALTH_WAIT,
            listener: Arc::new(NoOpAttemptListener),
        }
    }

    /// Sets the default policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs `gate` once before the first attempt of every execution.
    #[must_use]
    pub fn with_health_gate(mut self, gate: HealthGate) -> Self {
        self.health_gate = Some(gate);
        self
    }

    /// Sets how long the health gate may wait.
    #[must_use]
    pub fn with_health_wait(mut self, wait: Duration) -> Self {
        self.health_wait = wait;
        self
    }

    /// Sets the attempt listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn AttemptListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Returns the default policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `op` under the executor's own policy.
    pub async fn execute<T, O>(&self, op: &O) -> Result<T, Failure>
    where
        T: Send,
        O: Operation<T> + ?Sized,
    {
        let token = Arc::new(CancellationToken::new());
        self.execute_with(op, &self.policy, &token).await
    }

    /// Executes `op` under `policy`, aborting when `token` is cancelled.
    ///
    /// At most `policy.max_retries + 1` attempts are made, strictly one after
    /// another. A non-retryable failure ends the execution immediately; when
    /// the budget runs out the last failure seen is returned.
    pub async fn execute_with<T, O>(
        &self,
        op: &O,
        policy: &RetryPolicy,
        token: &Arc<CancellationToken>,
    ) -> Result<T, Failure>
    where
        T: Send,
        O: Operation<T> + ?Sized,
    {
        let execution_id = Uuid::new_v4();
        self.preflight(token).await;

        let classifier = policy.classifier();
        let max_attempts = policy.max_attempts();
        let mut delay_before = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            let started_at = Utc::now();
            let start = Instant::now();
            let result = with_timeout(op, policy.timeout, token).await;
            let elapsed = start.elapsed();

            let record = |outcome: AttemptOutcome| AttemptRecord {
                execution_id,
                attempt,
                max_attempts,
                delay_before,
                started_at,
                elapsed,
                outcome,
            };

            let failure = match result {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(%execution_id, attempts = attempt + 1, "Query succeeded after retry");
                    }
                    self.listener.on_attempt(&record(AttemptOutcome::Succeeded));
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            if failure.is_cancelled() {
                self.listener.on_attempt(&record(AttemptOutcome::Cancelled {
                    failure: failure.clone(),
                }));
                return Err(failure);
            }

            if !classifier.is_retryable(&failure) {
                debug!(%execution_id, attempt = attempt + 1, error = %failure, "Query failed with terminal error");
                self.listener.on_attempt(&record(AttemptOutcome::Terminal {
                    failure: failure.clone(),
                }));
                return Err(failure);
            }

            if attempt >= policy.max_retries {
                debug!(%execution_id, attempts = attempt + 1, error = %failure, "Query retries exhausted");
                self.listener.on_attempt(&record(AttemptOutcome::Exhausted {
                    failure: failure.clone(),
                }));
                return Err(failure);
            }

            let delay = delay_for(attempt, policy);
            log_retry(&failure, attempt, max_attempts, delay);
            self.listener.on_attempt(&record(AttemptOutcome::Retrying {
                failure,
                next_delay: delay,
            }));

            tokio::select! {
                biased;
                () = token.cancelled() => return Err(cancelled_failure(token)),
                () = tokio::time::sleep(delay) => {}
            }

            delay_before = delay;
            attempt += 1;
        }
    }

    async fn preflight(&self, token: &CancellationToken) {
        let Some(gate) = &self.health_gate else {
            return;
        };
        // A cancelled token also ends the wait early; that is not a health failure.
        if !gate.wait_for_healthy(self.health_wait, token).await && !token.is_cancelled() {
            warn!(
                wait_ms = self.health_wait.as_millis() as u64,
                "Connection health check failed, proceeding anyway..."
            );
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("health_gate", &self.health_gate)
            .field("health_wait", &self.health_wait)
            .finish_non_exhaustive()
    }
}

fn log_retry(failure: &Failure, attempt: u32, max_attempts: u32, delay: Duration) {
    let n = attempt + 1;
    let delay_ms = delay.as_millis() as u64;

    if failure.is_timeout() {
        warn!(
            attempt = n,
            max_attempts,
            delay_ms,
            error = %failure,
            "Query timed out (attempt {n}/{max_attempts}), retrying in {delay_ms}ms..."
        );
    } else {
        warn!(
            attempt = n,
            max_attempts,
            delay_ms,
            error = %failure,
            code = failure.code().unwrap_or_default(),
            "Query failed (attempt {n}/{max_attempts}), retrying in {delay_ms}ms..."
        );
    }
}

/// Executes `op` once under `policy` with a default executor.
pub async fn with_reliability<T, O>(op: &O, policy: RetryPolicy) -> Result<T, Failure>
where
    T: Send,
    O: Operation<T> + ?Sized,
{
    RetryExecutor::new().with_policy(policy).execute(op).await
}
