//! Writer domain types.

use shared_types::{Iri, ProcessingError};
use thiserror::Error;

/// Classified writer failures.
///
/// Transient failures are surfaced so the operation-batch source retries;
/// everything else requires the caller to reissue the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriterError {
    /// Retryable: the batch may be written again as-is.
    #[error("transient writer error: {0}")]
    Transient(String),

    /// Not retryable: retrying would fail again or duplicate durable
    /// state.
    #[error("writer error: {0}")]
    NonRetryable(String),
}

impl WriterError {
    /// Wrap a lower-level error as transient.
    pub fn transient(e: impl std::fmt::Display) -> Self {
        Self::Transient(e.to_string())
    }

    /// Wrap a lower-level error as non-retryable.
    pub fn fatal(e: impl std::fmt::Display) -> Self {
        Self::NonRetryable(e.to_string())
    }

    /// True when the caller should retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<ProcessingError> for WriterError {
    fn from(e: ProcessingError) -> Self {
        if e.is_transient() {
            Self::Transient(e.to_string())
        } else {
            Self::NonRetryable(e.to_string())
        }
    }
}

/// Credential lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcStatus {
    /// Offered for witnessing; proofs outstanding.
    InProcess,
    /// Witnessed and published.
    Completed,
}

/// A witness chosen for a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessEntry {
    /// The witness service IRI.
    pub iri: Iri,
    /// Whether the witness advertises a transparency log.
    pub has_log: bool,
}
