//! Cooperative cancellation for executions and batches.
//!
//! A `CancellationToken` is threaded through every suspension point of the
//! executor: the health-gate poll, the backoff sleep and the timeout race.

mod token;

pub use token::{CancelCallback, CancellationToken, ChildToken};
