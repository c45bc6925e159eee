//! Best-effort connection health gating.
//!
//! The gate polls a probe before the first attempt of an execution. A failed
//! gate is advisory only: the executor logs a warning and calls the operation
//! anyway, since probes can report false negatives.

mod gate;
#[cfg(feature = "http")]
mod http;
mod probe;

pub use gate::{HealthGate, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL};
#[cfg(feature = "http")]
pub use http::HttpHealthProbe;
pub use probe::{AlwaysHealthy, FnProbe, HealthProbe};

#[cfg(test)]
pub use probe::MockHealthProbe;
