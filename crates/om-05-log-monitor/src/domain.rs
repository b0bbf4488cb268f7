//! Monitor domain types.

use shared_crypto::CryptoError;
use shared_types::StoreError;
use shared_vct::rfc6962::ProofError;
use shared_vct::{SignedTreeHead, VctError};
use thiserror::Error;

/// Per-log monitor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStatus {
    /// The log's base URL.
    pub log_url: String,
    /// Whether the log is monitored.
    pub active: bool,
    /// Last verified STH, if any.
    pub sth: Option<SignedTreeHead>,
    /// The log's public key as last fetched.
    pub public_key: Option<Vec<u8>>,
}

impl LogStatus {
    /// A fresh, active status with no verified head yet.
    #[must_use]
    pub fn new(log_url: impl Into<String>) -> Self {
        Self {
            log_url: log_url.into(),
            active: true,
            sth: None,
            public_key: None,
        }
    }
}

/// Errors from one log's verification pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// A log query failed.
    #[error("log query failed: {0}")]
    Client(#[from] VctError),

    /// The tree-head signature did not verify.
    #[error("tree head signature invalid: {0}")]
    Signature(#[from] CryptoError),

    /// A consistency or reconstruction check failed.
    #[error("consistency check failed: {0}")]
    Proof(#[from] ProofError),

    /// The rebuilt tree does not match the advertised root.
    #[error("rebuilt root differs from STH root for tree size {tree_size}")]
    RootMismatch { tree_size: u64 },

    /// The log shrank, which an append-only log must never do.
    #[error("log regressed from tree size {prior} to {current}")]
    Regressed { prior: u64, current: u64 },

    /// The log returned a malformed head.
    #[error("malformed tree head: {0}")]
    MalformedHead(String),

    /// The monitor store failed.
    #[error("monitor store failed: {0}")]
    Store(#[from] StoreError),
}
