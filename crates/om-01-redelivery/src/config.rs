//! Redelivery configuration.

use std::time::Duration;

/// Tuning for the redelivery engine.
#[derive(Debug, Clone)]
pub struct RedeliveryConfig {
    /// Redelivery publishes per message before a terminal drop.
    pub max_attempts: u32,
    /// First wait interval.
    pub initial_interval: Duration,
    /// Growth factor between consecutive wait intervals.
    pub multiplier: f64,
    /// Cap on any single wait interval.
    pub max_interval: Duration,
}

impl Default for RedeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_interval: Duration::from_secs(2),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
        }
    }
}
