//! Bounded-concurrency fan-out over the retry executor.

use super::retry::RetryExecutor;
use super::timeout::cancelled_failure;
use crate::cancellation::CancellationToken;
use crate::errors::Failure;
use crate::operation::Operation;
use crate::policy::RetryPolicy;
use futures::stream::{FuturesUnordered, StreamExt};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, error};

/// Default cap on simultaneously running operations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// A successful result tagged with its operation's position in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<T> {
    /// Index of the operation in the submitted slice.
    pub index: usize,
    /// The value it produced.
    pub value: T,
}

/// A settled result tagged with its operation's position in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled<T> {
    /// Index of the operation in the submitted slice.
    pub index: usize,
    /// What the executor returned for it.
    pub result: Result<T, Failure>,
}

/// Outcome of a fail-fast batch.
///
/// `completed` lists values in completion order; use
/// [`into_ordered_result`](Self::into_ordered_result) to restore input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult<T> {
    /// Every operation produced a value.
    AllSucceeded {
        /// The values, in completion order.
        values: Vec<Completed<T>>,
    },
    /// An operation failed terminally; nothing was dispatched after it.
    PartialFailure {
        /// Values from operations that finished successfully.
        completed: Vec<Completed<T>>,
        /// Index of the first operation observed to fail.
        failed_at: usize,
        /// Its failure.
        cause: Failure,
        /// Operations never started because of the failure.
        not_started: usize,
    },
    /// The batch token was cancelled before every operation finished.
    Cancelled {
        /// Values from operations that finished successfully.
        completed: Vec<Completed<T>>,
        /// The cancellation failure.
        cause: Failure,
        /// Operations never started because of the cancellation.
        not_started: usize,
    },
}

impl<T> BatchResult<T> {
    /// Returns true if every operation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::AllSucceeded { .. })
    }

    /// Returns the successful values produced so far.
    #[must_use]
    pub fn completed(&self) -> &[Completed<T>] {
        match self {
            Self::AllSucceeded { values } => values,
            Self::PartialFailure { completed, .. } | Self::Cancelled { completed, .. } => completed,
        }
    }

    /// Returns the failure that stopped the batch, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&Failure> {
        match self {
            Self::AllSucceeded { .. } => None,
            Self::PartialFailure { cause, .. } | Self::Cancelled { cause, .. } => Some(cause),
        }
    }

    /// Flattens into the values in completion order, or the stopping failure.
    pub fn into_result(self) -> Result<Vec<T>, Failure> {
        match self {
            Self::AllSucceeded { values } => Ok(values.into_iter().map(|c| c.value).collect()),
            Self::PartialFailure { cause, .. } | Self::Cancelled { cause, .. } => Err(cause),
        }
    }

    /// Flattens into the values in input order, or the stopping failure.
    pub fn into_ordered_result(self) -> Result<Vec<T>, Failure> {
        match self {
            Self::AllSucceeded { mut values } => {
                values.sort_by_key(|c| c.index);
                Ok(values.into_iter().map(|c| c.value).collect())
            }
            Self::PartialFailure { cause, .. } | Self::Cancelled { cause, .. } => Err(cause),
        }
    }
}

/// Runs many operations through one [`RetryExecutor`] with a concurrency cap.
///
/// Operations are dispatched from the front of the slice. Whenever one
/// settles the next pending operation starts, so up to `max_concurrency`
/// are always in flight while work remains.
#[derive(Debug, Clone)]
pub struct ParallelRunner {
    executor: RetryExecutor,
    max_concurrency: NonZeroUsize,
}

impl ParallelRunner {
    /// Creates a runner over `executor` with the default concurrency.
    #[must_use]
    pub fn new(executor: RetryExecutor) -> Self {
        Self {
            executor,
            max_concurrency: NonZeroUsize::new(DEFAULT_MAX_CONCURRENCY).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Sets the concurrency cap.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: NonZeroUsize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Returns the concurrency cap.
    #[must_use]
    pub fn max_concurrency(&self) -> NonZeroUsize {
        self.max_concurrency
    }

    /// Returns the underlying executor.
    #[must_use]
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Runs `ops` fail-fast under the executor's policy.
    pub async fn run_all<T, O>(&self, ops: &[O]) -> BatchResult<T>
    where
        T: Send,
        O: Operation<T>,
    {
        let token = Arc::new(CancellationToken::new());
        self.run_all_with(ops, self.executor.policy(), &token).await
    }

    /// Runs `ops` fail-fast under `policy`.
    ///
    /// After the first terminal failure no new operation is started. Those
    /// already in flight finish naturally and their values are kept.
    pub async fn run_all_with<T, O>(
        &self,
        ops: &[O],
        policy: &RetryPolicy,
        token: &Arc<CancellationToken>,
    ) -> BatchResult<T>
    where
        T: Send,
        O: Operation<T>,
    {
        let limit = self.max_concurrency.get();
        let mut pending = ops.iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut completed = Vec::with_capacity(ops.len());
        let mut first_failure: Option<(usize, Failure)> = None;
        let mut dispatched = 0usize;

        loop {
            while first_failure.is_none() && !token.is_cancelled() && in_flight.len() < limit {
                let Some((index, op)) = pending.next() else {
                    break;
                };
                dispatched += 1;
                in_flight.push(async move {
                    (index, self.executor.execute_with(op, policy, token).await)
                });
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(value) => completed.push(Completed { index, value }),
                Err(failure) if first_failure.is_none() => {
                    error!(index, error = %failure, "Parallel query failed: {}", failure);
                    first_failure = Some((index, failure));
                }
                Err(failure) => {
                    debug!(index, error = %failure, "Additional failure while draining batch");
                }
            }
        }

        let not_started = ops.len() - dispatched;
        match first_failure {
            Some((_, cause)) if cause.is_cancelled() => BatchResult::Cancelled {
                completed,
                cause,
                not_started,
            },
            Some((failed_at, cause)) => BatchResult::PartialFailure {
                completed,
                failed_at,
                cause,
                not_started,
            },
            None if not_started > 0 => BatchResult::Cancelled {
                completed,
                cause: cancelled_failure(token),
                not_started,
            },
            None => BatchResult::AllSucceeded { values: completed },
        }
    }

    /// Runs every operation to completion under the executor's policy,
    /// collecting one result per operation instead of stopping early.
    pub async fn run_all_settled<T, O>(&self, ops: &[O]) -> Vec<Settled<T>>
    where
        T: Send,
        O: Operation<T>,
    {
        let token = Arc::new(CancellationToken::new());
        self.run_all_settled_with(ops, self.executor.policy(), &token).await
    }

    /// Partial-success variant of [`run_all_with`](Self::run_all_with).
    ///
    /// Results come back in completion order. Operations not started before
    /// `token` was cancelled are reported as cancelled failures.
    pub async fn run_all_settled_with<T, O>(
        &self,
        ops: &[O],
        policy: &RetryPolicy,
        token: &Arc<CancellationToken>,
    ) -> Vec<Settled<T>>
    where
        T: Send,
        O: Operation<T>,
    {
        let limit = self.max_concurrency.get();
        let mut pending = ops.iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut settled = Vec::with_capacity(ops.len());

        loop {
            while !token.is_cancelled() && in_flight.len() < limit {
                let Some((index, op)) = pending.next() else {
                    break;
                };
                in_flight.push(async move {
                    (index, self.executor.execute_with(op, policy, token).await)
                });
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };
            if let Err(ref failure) = result {
                debug!(index, error = %failure, "Batch operation failed");
            }
            settled.push(Settled { index, result });
        }

        for (index, _) in pending {
            settled.push(Settled {
                index,
                result: Err(cancelled_failure(token)),
            });
        }

        settled
    }
}

impl Default for ParallelRunner {
    fn default() -> Self {
        Self::new(RetryExecutor::default())
    }
}
