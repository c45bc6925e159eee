//! Mock operations for testing.

use crate::cancellation::CancellationToken;
use crate::errors::Failure;
use crate::operation::Operation;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// An operation that replays a fixed list of results.
///
/// Call `n` returns `script[n]`; once the script runs out the last entry
/// repeats.
#[derive(Debug)]
pub struct ScriptedOperation<T> {
    script: Vec<Result<T, Failure>>,
    latency: Duration,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl<T> ScriptedOperation<T> {
    /// Creates a scripted operation.
    #[must_use]
    pub fn new(script: Vec<Result<T, Failure>>) -> Self {
        Self {
            script,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps for `latency` before every result.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns the number of times the operation was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns when each call started.
    #[must_use]
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }

    /// Returns the time between consecutive call starts.
    #[must_use]
    pub fn call_gaps(&self) -> Vec<Duration> {
        self.call_times()
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }
}

#[async_trait]
impl<T> Operation<T> for ScriptedOperation<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn call(&self, _token: Arc<CancellationToken>) -> Result<T, Failure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.script
            .get(n)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| Err(Failure::new("scripted operation has no results")))
    }
}

/// An operation that never resolves.
#[derive(Debug, Default)]
pub struct PendingOperation {
    calls: AtomicUsize,
}

impl PendingOperation {
    /// Creates a pending operation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of times the operation was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> Operation<T> for PendingOperation {
    async fn call(&self, _token: Arc<CancellationToken>) -> Result<T, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Counts simultaneously running operations.
#[derive(Debug, Default)]
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl ConcurrencyTracker {
    /// Creates a tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one operation as running until the guard drops.
    pub fn enter(&self) -> ConcurrencyGuard<'_> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ConcurrencyGuard { tracker: self }
    }

    /// Operations running right now.
    #[must_use]
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest number ever running at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Operations started so far.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

/// Decrements the tracker's running count on drop.
#[derive(Debug)]
pub struct ConcurrencyGuard<'a> {
    tracker: &'a ConcurrencyTracker,
}

impl Drop for ConcurrencyGuard<'_> {
    fn drop(&mut self) {
        self.tracker.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An operation that holds a tracker slot for a fixed time, then succeeds.
#[derive(Debug, Clone)]
pub struct ConcurrencyProbeOperation {
    tracker: Arc<ConcurrencyTracker>,
    hold: Duration,
}

impl ConcurrencyProbeOperation {
    /// Creates a probe operation.
    #[must_use]
    pub fn new(tracker: Arc<ConcurrencyTracker>, hold: Duration) -> Self {
        Self { tracker, hold }
    }
}

#[async_trait]
impl Operation<()> for ConcurrencyProbeOperation {
    async fn call(&self, _token: Arc<CancellationToken>) -> Result<(), Failure> {
        let _guard = self.tracker.enter();
        tokio::time::sleep(self.hold).await;
        Ok(())
    }
}
