//! # Shared VCT
//!
//! Everything the log monitor and the inclusion watcher share about
//! transparency logs: the signed tree head (STH) type and its canonical
//! signed-bytes layout, the RFC 6962 Merkle hashing and proof verification
//! rules, and the HTTP client for the VC-log wire protocol.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod rfc6962;
pub mod sth;

pub use client::{HttpLogClient, InclusionProof, LogClient, VctError, PUBLIC_KEY_PROPERTY};
pub use sth::SignedTreeHead;
