//! Recording listeners and log capture.

use crate::observability::{AttemptListener, AttemptRecord};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// An attempt listener that keeps every record it receives.
#[derive(Debug, Default)]
pub struct RecordingAttemptListener {
    records: Mutex<Vec<AttemptRecord>>,
}

impl RecordingAttemptListener {
    /// Creates a recording listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records received so far.
    #[must_use]
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().clone()
    }

    /// Clears recorded records.
    pub fn reset(&self) {
        self.records.lock().clear();
    }
}

impl AttemptListener for RecordingAttemptListener {
    fn on_attempt(&self, record: &AttemptRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Captures formatted log output in memory.
///
/// Install with `tracing::subscriber::set_default(capture.subscriber())`
/// for the duration of a test.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a debug-level subscriber writing into this capture.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }

    /// Returns everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

/// Writer handed out by [`LogCapture`].
#[derive(Debug)]
pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: self.buffer.clone(),
        }
    }
}
