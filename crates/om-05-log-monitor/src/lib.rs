//! # OM-05 Log Monitor
//!
//! Periodic consistency checking of the transparency logs this node
//! watches. Every tick, for every active log: fetch the current STH,
//! fetch the log's public key, verify the tree-head signature, then prove
//! that the new head extends the previously verified one - by full tree
//! reconstruction for small first sights, or by an RFC 6962 consistency
//! proof afterwards. Verified state is persisted per log; any failure
//! leaves the stored state untouched so the next tick retries.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod service;
pub mod store;

pub use domain::{LogStatus, MonitorError};
pub use service::{LogMonitor, MonitorConfig};
pub use store::{MemoryMonitorStore, MonitorStore};
