//! # Resilient Query
//!
//! Reliable execution of fallible remote operations.
//!
//! Resilient Query wraps calls to a remote data service with:
//!
//! - **Error classification**: transient failures are recognised by code or message signature
//! - **Exponential backoff**: capped, deterministic delays between attempts
//! - **Per-attempt timeouts**: a hung call becomes a timeout failure
//! - **Health gating**: an optional, advisory connectivity check before the first attempt
//! - **Bounded fan-out**: a batch never runs more than a fixed number of operations at once
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resilient_query::prelude::*;
//!
//! let runner = LoaderConfig::default().build_runner()?;
//!
//! let ops: Vec<_> = ids
//!     .iter()
//!     .map(|id| from_fn(move || fetch_row(*id)))
//!     .collect();
//!
//! let rows = runner.run_all(&ops).await.into_ordered_result()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod executor;
pub mod health;
pub mod observability;
pub mod operation;
pub mod policy;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::LoaderConfig;
    pub use crate::errors::{ConfigError, Failure, FailureKind, PolicyError};
    pub use crate::executor::{
        with_reliability, with_timeout, BatchResult, Completed, ParallelRunner, RetryExecutor,
        Settled,
    };
    pub use crate::health::{AlwaysHealthy, FnProbe, HealthGate, HealthProbe};
    pub use crate::observability::{
        init_logging, AttemptListener, AttemptOutcome, AttemptRecord, LogFormat,
    };
    pub use crate::operation::{cancellable_fn, from_fn, Operation};
    pub use crate::policy::{
        delay_for, exponential_delay, is_retryable, ErrorClassifier, JitterStrategy, RetryPolicy,
    };
}
