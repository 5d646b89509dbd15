//! Monotonic software reference clock.
//!
//! Ticks are nanoseconds of `Instant` time, scaled by the current speed
//! skew. The plain (non-interpolated) reading only advances on refresh
//! boundaries, mimicking a clock that is updated from vblank events.

use std::num::NonZeroU64;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use presclock_common::clock::{refresh_interval_ticks, Tick, NANOS_PER_SEC};
use presclock_common::config::ReferenceConfig;
use presclock_common::error::{ClockError, ClockResult};

use crate::{align_down, align_up, ReferenceClock, RefreshRate, Waited};

/// Maximum skew accepted by [`ReferenceClock::set_speed`].
const MAX_SPEED: f64 = 2.0;

const FREQUENCY: NonZeroU64 = match NonZeroU64::new(NANOS_PER_SEC) {
    Some(frequency) => frequency,
    None => panic!("tick frequency must be non-zero"),
};

/// Piecewise-linear mapping from `Instant` to ticks. Re-anchored whenever
/// the speed changes so the tick count never jumps.
#[derive(Debug, Clone, Copy)]
struct Timeline {
    anchor: Instant,
    anchor_tick: Tick,
    speed: f64,
}

impl Timeline {
    fn tick_at(&self, now: Instant) -> Tick {
        let elapsed = now.saturating_duration_since(self.anchor).as_nanos() as f64;
        self.anchor_tick + (elapsed * self.speed) as Tick
    }
}

/// Software reference clock driven by the host's monotonic clock.
pub struct SystemReferenceClock {
    timeline: Mutex<Timeline>,
    refresh_rate_hz: Mutex<u32>,
    /// Bumped by `interrupt_waits` to release blocked waiters.
    wake_generation: Mutex<u64>,
    wake: Condvar,
}

impl SystemReferenceClock {
    /// Create a clock starting at tick zero, locked to `refresh_rate_hz`.
    pub fn new(refresh_rate_hz: u32) -> Self {
        Self {
            timeline: Mutex::new(Timeline {
                anchor: Instant::now(),
                anchor_tick: 0,
                speed: 1.0,
            }),
            refresh_rate_hz: Mutex::new(refresh_rate_hz),
            wake_generation: Mutex::new(0),
            wake: Condvar::new(),
        }
    }

    /// Create a clock from configuration.
    pub fn from_config(config: &ReferenceConfig) -> Self {
        Self::new(config.refresh_rate_hz)
    }

    /// Change the refresh rate the clock is locked to. Zero stops the
    /// refresh schedule.
    pub fn set_refresh_rate(&self, refresh_rate_hz: u32) -> ClockResult<()> {
        if refresh_rate_hz as u64 > NANOS_PER_SEC {
            return Err(ClockError::invalid_refresh_rate(format!(
                "{refresh_rate_hz} Hz exceeds the tick frequency"
            )));
        }
        *self.refresh_rate_hz.lock() = refresh_rate_hz;
        tracing::info!(refresh_rate_hz, "Reference clock refresh rate changed");
        Ok(())
    }

    /// Current speed skew.
    pub fn speed(&self) -> f64 {
        self.timeline.lock().speed
    }

    /// Wake every thread blocked in [`ReferenceClock::wait`]. Woken waiters
    /// return with `reached == false` if their target has not passed.
    pub fn interrupt_waits(&self) {
        let mut generation = self.wake_generation.lock();
        *generation = generation.wrapping_add(1);
        self.wake.notify_all();
        tracing::debug!("Interrupted reference clock waiters");
    }

    fn interval_ticks(&self) -> Option<Tick> {
        refresh_interval_ticks(*self.refresh_rate_hz.lock(), self.frequency())
    }

    fn raw_tick(&self) -> Tick {
        self.timeline.lock().tick_at(Instant::now())
    }

    /// Real time needed to cover `ticks` at the current speed.
    fn real_duration(&self, ticks: Tick) -> Duration {
        let speed = self.speed();
        Duration::from_nanos((ticks.max(0) as f64 / speed).ceil() as u64)
    }
}

impl Default for SystemReferenceClock {
    fn default() -> Self {
        Self::from_config(&ReferenceConfig::default())
    }
}

impl ReferenceClock for SystemReferenceClock {
    fn time(&self, interpolated: bool) -> Tick {
        let tick = self.raw_tick();
        match (interpolated, self.interval_ticks()) {
            (false, Some(interval)) => align_down(tick, interval),
            _ => tick,
        }
    }

    fn frequency(&self) -> NonZeroU64 {
        FREQUENCY
    }

    fn next_tick_time(&self, target: Tick) -> Option<Tick> {
        self.interval_ticks().map(|interval| align_up(target, interval))
    }

    fn wait(&self, target: Tick, timeout: Option<Duration>) -> Waited {
        let start = self.raw_tick();
        // A timeout past the end of `Instant` is the same as no timeout.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut generation = self.wake_generation.lock();
        let entered_generation = *generation;

        loop {
            let now = self.raw_tick();
            if now >= target {
                return Waited {
                    tick: now,
                    elapsed: now - start,
                    reached: true,
                };
            }

            let interrupted = *generation != entered_generation;
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if interrupted || expired {
                return Waited {
                    tick: now,
                    elapsed: now - start,
                    reached: false,
                };
            }

            let until = Instant::now().checked_add(self.real_duration(target.saturating_sub(now)));
            match (until, deadline) {
                (Some(until), Some(d)) => {
                    self.wake.wait_until(&mut generation, until.min(d));
                }
                (Some(until), None) => {
                    self.wake.wait_until(&mut generation, until);
                }
                (None, Some(d)) => {
                    self.wake.wait_until(&mut generation, d);
                }
                (None, None) => self.wake.wait(&mut generation),
            }
        }
    }

    fn refresh_rate(&self) -> Option<RefreshRate> {
        RefreshRate::from_hz(*self.refresh_rate_hz.lock())
    }

    fn set_speed(&self, speed: f64) {
        if !speed.is_finite() || speed <= 0.0 || speed > MAX_SPEED {
            tracing::warn!(speed, "Ignoring out-of-range reference clock speed");
            return;
        }
        let mut timeline = self.timeline.lock();
        let now = Instant::now();
        let tick = timeline.tick_at(now);
        *timeline = Timeline {
            anchor: now,
            anchor_tick: tick,
            speed,
        };
    }

    fn name(&self) -> &str {
        "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn default_follows_config() {
        let clock = SystemReferenceClock::default();
        assert_eq!(clock.refresh_rate().unwrap().hz, 60);
        assert_eq!(clock.frequency().get(), NANOS_PER_SEC);
        assert_eq!(clock.name(), "system");
    }

    #[test]
    fn ticks_are_monotonic() {
        let clock = SystemReferenceClock::new(60);
        let a = clock.time(true);
        let b = clock.time(true);
        assert!(b >= a);
        assert!(clock.time(false) <= clock.time(true));
    }

    #[test]
    fn plain_reading_sits_on_refresh_boundary() {
        let clock = SystemReferenceClock::new(50);
        let tick = clock.time(false);
        assert_eq!(tick % 20_000_000, 0);
    }

    #[test]
    fn next_tick_requires_refresh_schedule() {
        let clock = SystemReferenceClock::new(0);
        assert_eq!(clock.next_tick_time(12345), None);
        assert!(clock.refresh_rate().is_none());

        clock.set_refresh_rate(100).unwrap();
        assert_eq!(clock.next_tick_time(12345), Some(10_000_000));
        assert_eq!(clock.refresh_rate().unwrap().hz, 100);
    }

    #[test]
    fn wait_reaches_target() {
        let clock = SystemReferenceClock::new(60);
        let target = clock.time(true) + 2_000_000;
        let waited = clock.wait(target, Some(Duration::from_secs(1)));
        assert!(waited.reached);
        assert!(waited.tick >= target);
        assert!(waited.elapsed >= 0);
    }

    #[test]
    fn wait_honours_timeout() {
        let clock = SystemReferenceClock::new(60);
        let target = clock.time(true) + 60 * NANOS_PER_SEC as Tick;
        let waited = clock.wait(target, Some(Duration::from_millis(5)));
        assert!(!waited.reached);
        assert!(waited.tick < target);
    }

    #[test]
    fn interrupt_releases_blocked_waiter() {
        let clock = Arc::new(SystemReferenceClock::new(60));
        let waiter = {
            let clock = Arc::clone(&clock);
            std::thread::spawn(move || {
                let target = clock.time(true) + 3600 * NANOS_PER_SEC as Tick;
                clock.wait(target, None)
            })
        };
        while !waiter.is_finished() {
            clock.interrupt_waits();
            std::thread::sleep(Duration::from_millis(5));
        }
        let waited = waiter.join().unwrap();
        assert!(!waited.reached);
    }

    #[test]
    fn unreachable_target_waits_until_timeout() {
        let clock = SystemReferenceClock::new(60);
        let waited = clock.wait(Tick::MAX, Some(Duration::from_millis(5)));
        assert!(!waited.reached);
        assert_eq!(clock.next_tick_time(Tick::MAX), Some(Tick::MAX));
    }

    #[test]
    fn set_speed_rejects_out_of_range() {
        let clock = SystemReferenceClock::new(60);
        clock.set_speed(1.001);
        assert!((clock.speed() - 1.001).abs() < 1e-12);
        clock.set_speed(0.0);
        clock.set_speed(f64::NAN);
        assert!((clock.speed() - 1.001).abs() < 1e-12);
    }

    #[test]
    fn speed_change_keeps_ticks_continuous() {
        let clock = SystemReferenceClock::new(60);
        let before = clock.time(true);
        clock.set_speed(0.5);
        let after = clock.time(true);
        assert!(after >= before);
    }
}
