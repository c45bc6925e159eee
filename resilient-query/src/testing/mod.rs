//! Testing utilities for code built on resilient-query.
//!
//! This module provides:
//! - Scripted and never-resolving operations
//! - A concurrency-tracking operation for batch tests
//! - Recording attempt listeners and log capture

mod listeners;
mod operations;

pub use listeners::{LogCapture, LogCaptureWriter, RecordingAttemptListener};
pub use operations::{
    ConcurrencyGuard, ConcurrencyProbeOperation, ConcurrencyTracker, PendingOperation,
    ScriptedOperation,
};
