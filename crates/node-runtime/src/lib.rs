//! # Orb-Mesh Node Runtime
//!
//! Wires the subsystems into a running federated anchoring node:
//!
//! - the broker (in-memory, behind the managed connection front-end)
//! - the redelivery engine and the inbox pipeline
//! - the federation activity handler (Follow/Accept/Undo/Offer/Create)
//! - the periodic task manager driving anchor sync, the log monitor, and
//!   the inclusion watcher
//! - the HTTP service: inbox endpoint, `.well-known` discovery documents,
//!   and the maintenance-mode layer
//!
//! Startup ordering: the router must report `Running` before the HTTP
//! service accepts requests.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod handlers;
pub mod http;
pub mod outbox;
pub mod scheduler;
pub mod wiring;

pub use config::NodeConfig;
pub use scheduler::{PeriodicTask, TaskManager};
pub use wiring::Node;
