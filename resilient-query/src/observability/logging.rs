//! Process-wide log subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// Multi-line human-readable output.
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

/// Installs a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns false if a global subscriber was already installed; later calls
/// are no-ops.
pub fn init_logging(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(?format, "resilient-query logging initialized");
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let _ = init_logging(LogFormat::Compact);
        assert!(!init_logging(LogFormat::Json));
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
