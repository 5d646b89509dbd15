//! presclock reference clock providers
//!
//! A reference clock is the free-running timing source every presentation
//! clock reads from. It supplies monotonic tick counts at a fixed frequency,
//! reports the display refresh rate it is locked to, and can block a caller
//! until a tick is reached.
//!
//! - **System:** monotonic software clock backed by `Instant`
//! - **Fake:** manually advanced, for tests and non-realtime rendering

pub mod fake;
pub mod system;

use std::num::NonZeroU64;
use std::time::Duration;

pub use fake::FakeReferenceClock;
pub use presclock_common::clock::Tick;
pub use system::SystemReferenceClock;

/// Contract for reference clock providers.
///
/// Implementations are shared between the audio, video, demuxer and UI
/// threads, so every method takes `&self`.
pub trait ReferenceClock: Send + Sync {
    /// Current tick count. The interpolated variant smooths between hardware
    /// update events; the plain variant only advances on those events.
    fn time(&self, interpolated: bool) -> Tick;

    /// Ticks per second. Constant for the lifetime of the provider.
    fn frequency(&self) -> NonZeroU64;

    /// First tick boundary at or after `target`, or `None` when the provider
    /// has no tick schedule.
    fn next_tick_time(&self, target: Tick) -> Option<Tick>;

    /// Block until at least `target` is reached, the timeout expires, or the
    /// provider interrupts its waiters.
    fn wait(&self, target: Tick, timeout: Option<Duration>) -> Waited;

    /// Refresh rate the provider is locked to, or `None` when not running.
    fn refresh_rate(&self) -> Option<RefreshRate>;

    /// Run the provider itself at a skewed rate. `1.0` is real time.
    fn set_speed(&self, speed: f64);

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Outcome of [`ReferenceClock::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waited {
    /// Tick at which the wait returned.
    pub tick: Tick,
    /// Ticks spent blocked.
    pub elapsed: Tick,
    /// Whether `tick` reached the requested target.
    pub reached: bool,
}

/// Display refresh information reported by a running provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshRate {
    /// Refresh rate in Hz.
    pub hz: u32,
    /// Length of one refresh cycle in seconds.
    pub interval_secs: f64,
}

impl RefreshRate {
    /// Build from a rate in Hz. Zero is "not running".
    pub fn from_hz(hz: u32) -> Option<Self> {
        presclock_common::clock::refresh_interval_secs(hz)
            .map(|interval_secs| Self { hz, interval_secs })
    }
}

/// Round `target` up to the next multiple of `interval`, saturating at the
/// end of the tick range.
pub(crate) fn align_up(target: Tick, interval: Tick) -> Tick {
    let rem = target.rem_euclid(interval);
    if rem == 0 {
        target
    } else {
        target.saturating_add(interval - rem)
    }
}

/// Round `tick` down to the previous multiple of `interval`.
pub(crate) fn align_down(tick: Tick, interval: Tick) -> Tick {
    tick - tick.rem_euclid(interval)
}
