//! Observability utilities.

mod attempts;
mod logging;

pub use attempts::{
    AttemptListener, AttemptOutcome, AttemptRecord, LoggingAttemptListener, NoOpAttemptListener,
};
pub use logging::{init_logging, LogFormat};
