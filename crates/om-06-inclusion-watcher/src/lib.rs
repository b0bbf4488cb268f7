//! # OM-06 Inclusion Watcher
//!
//! A witness that signs a credential promises its inclusion in the
//! witness's transparency log before a deadline. This crate confirms the
//! promise: [`InclusionWatcher::watch`] tries an immediate proof-by-hash,
//! and entries that cannot be proven yet are queued `not_confirmed` for the
//! periodic worker, which confirms, expires, or leaves each one. State
//! lives only in the store, so the worker tolerates seeing the same entry
//! across any number of ticks.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod service;
pub mod store;

pub use domain::InclusionEntry;
pub use service::InclusionWatcher;
pub use store::{EntryStore, MemoryEntryStore};
