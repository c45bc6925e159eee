//! Retry policy, failure classification and backoff scheduling.
//!
//! This module provides:
//! - `RetryPolicy`, the immutable configuration shared by executions
//! - `ErrorClassifier` for transient vs. terminal decisions
//! - `delay_for` for the exponential backoff schedule

mod backoff;
mod classifier;
mod retry_policy;

pub use backoff::{delay_for, exponential_delay, JitterStrategy};
pub use classifier::{is_retryable, ErrorClassifier, DEFAULT_RETRYABLE_SIGNATURES};
pub use retry_policy::RetryPolicy;
