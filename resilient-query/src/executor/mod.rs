//! Resilient execution of remote operations.
//!
//! This module provides:
//! - The timeout racer bounding a single attempt
//! - `RetryExecutor`, the per-operation retry loop
//! - `ParallelRunner`, bounded-concurrency fan-out over the executor

mod parallel;
mod retry;
mod timeout;

pub use parallel::{BatchResult, Completed, ParallelRunner, Settled, DEFAULT_MAX_CONCURRENCY};
pub use retry::{with_reliability, RetryExecutor, DEFAULT_HEALTH_WAIT};
pub use timeout::{cancelled_failure, with_timeout};
