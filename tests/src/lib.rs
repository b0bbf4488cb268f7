//! # Orb-Mesh Test Suite
//!
//! Unified test crate for cross-subsystem choreography:
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── inbox_flow.rs       # HTTP ingest through handler to storage
//!     ├── redelivery_flow.rs  # nack/wait/backoff timing end to end
//!     ├── monitor_flow.rs     # STH growth gates across ticks
//!     ├── sync_resume.rs      # cursor resume across a restart
//!     └── anchor_flow.rs      # offer/witness/accept/create choreography
//! ```
//!
//! ```bash
//! cargo test -p om-tests
//! cargo test -p om-tests integration::
//! ```

#![allow(unused_imports)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod integration;
