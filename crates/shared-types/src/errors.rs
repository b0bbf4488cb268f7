//! # Error Taxonomy
//!
//! Failures crossing subsystem boundaries carry a retryability
//! classification. The inbox pipeline nacks transient errors and acks
//! persistent ones; periodic jobs swallow both into logs; the writer
//! surfaces transient errors so the batch source retries.

use thiserror::Error;

/// Classified error for activity and anchor processing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessingError {
    /// Retryable after backoff (broker publish failure, first-attempt store
    /// failure, empty witness list at Offer time).
    #[error("transient: {0}")]
    Transient(String),

    /// Non-retryable (malformed activity, signature failure, unsupported
    /// type). The pipeline acks so the broker stops redelivering.
    #[error("persistent: {0}")]
    Persistent(String),

    /// Idempotent re-processing already succeeded; handled as success.
    #[error("anchor event already processed")]
    DuplicateAnchorEvent,

    /// A deadline passed before the operation could complete.
    #[error("deadline expired: {0}")]
    Expired(String),
}

impl ProcessingError {
    /// Wrap a lower-level error as transient.
    pub fn transient(e: impl std::fmt::Display) -> Self {
        Self::Transient(e.to_string())
    }

    /// Wrap a lower-level error as persistent.
    pub fn persistent(e: impl std::fmt::Display) -> Self {
        Self::Persistent(e.to_string())
    }

    /// True when the caller should retry (nack / backoff).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors from the key-value stores.
///
/// `NotFound` is distinguished so callers can tell "first time seen" from a
/// real failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The iterator was closed before the read.
    #[error("iterator closed")]
    IteratorClosed,

    /// The underlying provider failed.
    #[error("store error: {0}")]
    Provider(String),
}

impl StoreError {
    /// True when the error is the distinguished not-found signal.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_preserved_through_wrapping() {
        let inner = StoreError::Provider("disk".to_string());
        let wrapped = ProcessingError::transient(inner);
        assert!(wrapped.is_transient());

        let wrapped = ProcessingError::persistent("bad signature");
        assert!(!wrapped.is_transient());
    }

    #[test]
    fn test_not_found_distinguished() {
        assert!(StoreError::NotFound("x".into()).is_not_found());
        assert!(!StoreError::Provider("x".into()).is_not_found());
    }
}
