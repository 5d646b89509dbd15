//! A reference clock that is entirely under the caller's control.
//!
//! Time only moves when [`FakeReferenceClock::advance`] or
//! [`FakeReferenceClock::set_time`] is called, or when a wait jumps it to
//! its target. Speed requests are recorded rather than applied.

use std::num::NonZeroU64;
use std::time::Duration;

use parking_lot::Mutex;
use presclock_common::clock::{refresh_interval_ticks, Tick};
use presclock_common::error::{ClockError, ClockResult};

use crate::{align_down, align_up, ReferenceClock, RefreshRate, Waited};

#[derive(Debug)]
struct FakeState {
    now: Tick,
    refresh_rate_hz: u32,
    speed: f64,
    speed_requests: usize,
}

/// Manually advanced reference clock.
#[derive(Debug)]
pub struct FakeReferenceClock {
    frequency: NonZeroU64,
    state: Mutex<FakeState>,
}

impl FakeReferenceClock {
    /// Create a fake clock at tick zero with no refresh schedule.
    pub fn new(frequency: u64) -> ClockResult<Self> {
        let frequency = NonZeroU64::new(frequency)
            .ok_or_else(|| ClockError::invalid_frequency("frequency must be non-zero"))?;
        Ok(Self {
            frequency,
            state: Mutex::new(FakeState {
                now: 0,
                refresh_rate_hz: 0,
                speed: 1.0,
                speed_requests: 0,
            }),
        })
    }

    /// Builder-style refresh rate.
    pub fn with_refresh_rate(self, refresh_rate_hz: u32) -> ClockResult<Self> {
        self.set_refresh_rate(refresh_rate_hz)?;
        Ok(self)
    }

    /// Change the reported refresh rate. Zero reports "not running".
    pub fn set_refresh_rate(&self, refresh_rate_hz: u32) -> ClockResult<()> {
        if refresh_rate_hz as u64 > self.frequency.get() {
            return Err(ClockError::invalid_refresh_rate(format!(
                "{refresh_rate_hz} Hz exceeds the tick frequency {}",
                self.frequency
            )));
        }
        self.state.lock().refresh_rate_hz = refresh_rate_hz;
        Ok(())
    }

    /// Move time forward by `ticks`.
    pub fn advance(&self, ticks: Tick) {
        self.state.lock().now += ticks;
    }

    /// Jump to an absolute tick.
    pub fn set_time(&self, tick: Tick) {
        self.state.lock().now = tick;
    }

    /// Last speed pushed through [`ReferenceClock::set_speed`].
    pub fn speed(&self) -> f64 {
        self.state.lock().speed
    }

    /// Number of speed requests received.
    pub fn speed_requests(&self) -> usize {
        self.state.lock().speed_requests
    }

    fn interval_ticks(&self, state: &FakeState) -> Option<Tick> {
        refresh_interval_ticks(state.refresh_rate_hz, self.frequency)
    }
}

impl ReferenceClock for FakeReferenceClock {
    fn time(&self, interpolated: bool) -> Tick {
        let state = self.state.lock();
        match (interpolated, self.interval_ticks(&state)) {
            (false, Some(interval)) => align_down(state.now, interval),
            _ => state.now,
        }
    }

    fn frequency(&self) -> NonZeroU64 {
        self.frequency
    }

    fn next_tick_time(&self, target: Tick) -> Option<Tick> {
        let state = self.state.lock();
        self.interval_ticks(&state).map(|interval| align_up(target, interval))
    }

    fn wait(&self, target: Tick, _timeout: Option<Duration>) -> Waited {
        let mut state = self.state.lock();
        let start = state.now;
        state.now = state.now.max(target);
        Waited {
            tick: state.now,
            elapsed: state.now - start,
            reached: true,
        }
    }

    fn refresh_rate(&self) -> Option<RefreshRate> {
        RefreshRate::from_hz(self.state.lock().refresh_rate_hz)
    }

    fn set_speed(&self, speed: f64) {
        let mut state = self.state.lock();
        state.speed = speed;
        state.speed_requests += 1;
    }

    fn name(&self) -> &str {
        "fake"
    }
}
