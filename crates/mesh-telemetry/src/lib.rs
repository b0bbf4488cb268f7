//! # Mesh Telemetry
//!
//! Logging and metrics for the Orb-Mesh node. One call to
//! [`logging::init`] at startup; counters registered once in a process-wide
//! Prometheus registry and bumped from the pipeline hot paths.

pub mod logging;
pub mod metrics;

pub use logging::{init, LogConfig};
