//! Backoff interval computation.

use crate::config::RedeliveryConfig;
use std::time::Duration;

/// The wait interval before redelivery number `count + 1`.
///
/// For the k-th wait (1-indexed) this is
/// `min(max_interval, initial_interval * multiplier^(k-1))`.
/// `count` is the number of redelivery publishes already made and is at
/// least 1 when a wait is scheduled.
#[must_use]
pub fn redelivery_interval(config: &RedeliveryConfig, count: u32) -> Duration {
    let exponent = count.saturating_sub(1);
    let factor = config.multiplier.powi(exponent as i32);
    let interval = config.initial_interval.mul_f64(factor);
    interval.min(config.max_interval)
}
