//! Tick and time-unit conversion helpers.
//!
//! Every clock in presclock counts in hardware ticks at a fixed frequency.
//! This module holds the arithmetic shared by providers and consumers:
//! - Converting tick spans to seconds and back
//! - Rounding helpers matching what the refresh compensator expects
//! - Refresh interval math

use std::num::NonZeroU64;

/// A raw reference clock tick count.
///
/// Signed so that spans between two ticks (and rescaled start points) can go
/// negative without wrapping.
pub type Tick = i64;

/// Nanoseconds per second, the tick frequency of the software provider.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Convert a span of ticks to seconds at the given frequency.
pub fn ticks_to_secs(ticks: Tick, frequency: NonZeroU64) -> f64 {
    ticks as f64 / frequency.get() as f64
}

/// Convert seconds to a span of ticks, rounded to the nearest tick.
pub fn secs_to_ticks(secs: f64, frequency: NonZeroU64) -> Tick {
    (secs * frequency.get() as f64).round() as Tick
}

/// Round to the nearest integer, halves away from zero.
pub fn round_int(value: f64) -> i64 {
    value.round() as i64
}

/// Length of one refresh cycle in seconds. Zero rates have no interval.
pub fn refresh_interval_secs(refresh_rate_hz: u32) -> Option<f64> {
    (refresh_rate_hz > 0).then(|| 1.0 / refresh_rate_hz as f64)
}

/// Length of one refresh cycle in ticks at the given frequency.
pub fn refresh_interval_ticks(refresh_rate_hz: u32, frequency: NonZeroU64) -> Option<Tick> {
    (refresh_rate_hz > 0).then(|| (frequency.get() / refresh_rate_hz as u64) as Tick)
}
