//! Transient vs. terminal failure classification.

use crate::errors::{Failure, FailureKind};

/// Signatures treated as transient when no custom set is configured.
///
/// Includes the PostgREST schema-cache codes and the usual network/timeout
/// wording produced by fetch stacks.
pub const DEFAULT_RETRYABLE_SIGNATURES: &[&str] = &[
    "PGRST204",
    "PGRST205",
    "network",
    "timeout",
    "connection",
    "ECONNRESET",
    "ETIMEDOUT",
    "Failed to fetch",
    "NetworkError",
    "Network request failed",
];

/// Returns true if `failure` matches any of `signatures`.
///
/// Matching is case-insensitive substring containment, first against the
/// code and then against the message. Failures with neither are terminal,
/// as are cancellations and panics.
pub fn is_retryable<S: AsRef<str>>(failure: &Failure, signatures: &[S]) -> bool {
    ErrorClassifier::new(signatures).is_retryable(failure)
}

/// Classifier over a fixed, pre-lowercased signature set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    signatures: Vec<String>,
}

impl ErrorClassifier {
    /// Creates a classifier for the given signatures.
    #[must_use]
    pub fn new<S: AsRef<str>>(signatures: &[S]) -> Self {
        Self {
            signatures: signatures
                .iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Decides whether `failure` is worth another attempt.
    #[must_use]
    pub fn is_retryable(&self, failure: &Failure) -> bool {
        if matches!(failure.kind(), FailureKind::Cancelled | FailureKind::Panicked) {
            return false;
        }

        let code = failure.code().unwrap_or_default();
        if !code.is_empty() && self.matches(&code.to_lowercase()) {
            return true;
        }

        let message = failure.message();
        !message.is_empty() && self.matches(&message.to_lowercase())
    }

    fn matches(&self, haystack: &str) -> bool {
        self.signatures.iter().any(|sig| haystack.contains(sig.as_str()))
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RETRYABLE_SIGNATURES)
    }
}
