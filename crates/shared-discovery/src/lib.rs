//! # Shared Discovery
//!
//! Client side of the `.well-known` discovery surface: WebFinger (JRD
//! documents), host-meta templates, ActivityPub actor documents, and the
//! ledger-type probe used before witnessing. Lookups are cached in a
//! bounded LRU with a configurable entry lifetime.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod jrd;

pub use client::{
    ActorDocument, DiscoveryClient, DiscoveryConfig, DiscoveryError, DiscoveryFetcher,
    HttpDiscoveryFetcher,
};
pub use jrd::{Jrd, JrdLink, LEDGER_TYPE_PROPERTY, MIN_RESOLVERS_PROPERTY};
