//! The presentation clock.
//!
//! Three independent lock domains:
//! - the shared [`TimeBase`] (read-mostly, written once),
//! - the per-clock [`PlayingState`] (readers: queries, writers: events),
//! - the per-clock [`SpeedAdjust`] settings for refresh compensation.
//!
//! The time base lock is always released before the playing-state lock is
//! taken, and the speed-adjust lock is never held together with either.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use presclock_common::clock::{ticks_to_secs, Tick};
use presclock_common::config::ClockConfig;
use presclock_common::error::ClockResult;
use presclock_reference::ReferenceClock;

use crate::playing::PlayingState;
use crate::speed::PlaySpeed;
use crate::speed_adjust::{
    compensated_speed, frame_weight, is_video_framerate, FramerateUpdate, SpeedAdjust,
};
use crate::time_base::{TickMapping, TimeBase};

/// Playing and absolute time taken from one reference tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockReading {
    /// Media time in seconds.
    pub playing: f64,
    /// Absolute time in seconds.
    pub absolute: f64,
}

/// Outcome of [`PresentationClock::wait_absolute_clock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitedClock {
    /// Absolute time at which the wait returned, in seconds.
    pub absolute: f64,
    /// Time spent blocked, in seconds of reference time.
    pub waited: f64,
    /// Whether the target was reached (false on timeout or interruption).
    pub reached: bool,
}

/// Thread-safe clock mapping reference ticks to absolute and playing time.
///
/// One instance per playback session; the tick mapping it reads outlives it.
pub struct PresentationClock {
    reference: Arc<dyn ReferenceClock>,
    time_base: Arc<TimeBase>,
    /// Copied from the time base at construction; immutable from then on.
    frequency: NonZeroU64,
    playing: RwLock<PlayingState>,
    speed_adjust: Mutex<SpeedAdjust>,
    /// Highest interpolated tick seen, for backwards-clock detection.
    last_interpolated: AtomicI64,
}

impl PresentationClock {
    /// Create a clock on the process-wide time base.
    pub fn new(reference: Arc<dyn ReferenceClock>) -> Self {
        Self::with_time_base(reference, TimeBase::global())
    }

    /// Create a clock on an explicit time base.
    pub fn with_time_base(reference: Arc<dyn ReferenceClock>, time_base: Arc<TimeBase>) -> Self {
        let frequency = time_base.mapping(reference.as_ref()).frequency;
        if frequency != reference.frequency() {
            tracing::warn!(
                time_base = frequency.get(),
                provider = reference.frequency().get(),
                "Reference clock frequency differs from the established time base"
            );
        }

        Self {
            reference,
            time_base,
            frequency,
            playing: RwLock::new(PlayingState::new(frequency)),
            speed_adjust: Mutex::new(SpeedAdjust::default()),
            last_interpolated: AtomicI64::new(Tick::MIN),
        }
    }

    /// Create a clock on the process-wide time base, applying `config`.
    pub fn from_config(
        reference: Arc<dyn ReferenceClock>,
        config: &ClockConfig,
    ) -> ClockResult<Self> {
        config.validate()?;
        let clock = Self::new(reference);
        clock.set_max_speed_adjust(config.max_speed_adjust_percent)?;
        Ok(clock)
    }

    /// The reference clock this clock reads from.
    pub fn reference(&self) -> &Arc<dyn ReferenceClock> {
        &self.reference
    }

    /// The tick mapping in use.
    pub fn tick_mapping(&self) -> TickMapping {
        self.mapping()
    }

    fn mapping(&self) -> TickMapping {
        self.time_base.mapping(self.reference.as_ref())
    }

    /// Warn when an interpolated reading is older than one already seen.
    /// Only the absolute read checks; plain readings may legitimately lag.
    fn check_backwards(&self, tick: Tick) {
        let previous = self.last_interpolated.fetch_max(tick, Ordering::Relaxed);
        if previous > tick {
            tracing::warn!(
                provider = self.reference.name(),
                backwards_ticks = previous - tick,
                frequency = self.frequency.get(),
                "Reference clock moved backwards"
            );
        }
    }

    // Absolute time

    /// Current absolute time in seconds, independent of playback state.
    pub fn absolute_clock(&self, interpolated: bool) -> f64 {
        let tick = self.reference.time(interpolated);
        if interpolated {
            self.check_backwards(tick);
        }
        self.mapping().absolute_from_ticks(tick)
    }

    /// Absolute time of the first reference tick boundary at or after
    /// `target`, or `None` when the reference has no tick schedule.
    pub fn next_absolute_clock_tick(&self, target: f64) -> Option<f64> {
        let mapping = self.mapping();
        self.reference
            .next_tick_time(mapping.ticks_from_absolute(target))
            .map(|tick| mapping.absolute_from_ticks(tick))
    }

    /// Block until absolute time `target`.
    ///
    /// `timeout` bounds the wait; `None` waits until the target is reached or
    /// the reference interrupts its waiters. No lock is held while blocked.
    pub fn wait_absolute_clock(&self, target: f64, timeout: Option<Duration>) -> WaitedClock {
        let mapping = self.mapping();
        let waited = self.reference.wait(mapping.ticks_from_absolute(target), timeout);

        WaitedClock {
            absolute: mapping.absolute_from_ticks(waited.tick),
            waited: ticks_to_secs(waited.elapsed, mapping.frequency),
            reached: waited.reached,
        }
    }

    // Playing time

    /// Current playing time in seconds.
    pub fn clock(&self, interpolated: bool) -> f64 {
        let tick = self.reference.time(interpolated);
        self.playing_at(tick)
    }

    /// Playing and absolute time from a single reference sample.
    pub fn clock_with_absolute(&self, interpolated: bool) -> ClockReading {
        let tick = self.reference.time(interpolated);
        let absolute = self.mapping().absolute_from_ticks(tick);
        ClockReading {
            playing: self.playing_at(tick),
            absolute,
        }
    }

    fn playing_at(&self, tick: Tick) -> f64 {
        {
            let state = self.playing.read();
            if !state.needs_reset() {
                return state.playing_at(tick);
            }
        }

        let mut state = self.playing.write();
        if state.needs_reset() {
            state.reset(tick, self.frequency);
            tracing::debug!(tick, "Playing clock started");
        }
        state.playing_at(tick)
    }

    // Playback events

    /// Change the playback speed. [`PlaySpeed::PAUSE`] pauses; any other
    /// speed resumes and rescales so playing time does not jump.
    pub fn set_speed(&self, speed: PlaySpeed) {
        let mut state = self.playing.write();
        let tick = self.reference.time(true);
        state.set_speed(speed, tick, self.frequency);
        tracing::debug!(%speed, tick, "Playback speed changed");
    }

    /// Last requested playback speed.
    pub fn speed(&self) -> PlaySpeed {
        self.playing.read().speed()
    }

    /// Re-base playing time so that it reads `playing_time` now.
    pub fn discontinuity(&self, playing_time: f64) {
        let mut state = self.playing.write();
        let tick = self.reference.time(true);
        state.discontinuity(playing_time, tick);
        tracing::debug!(playing_time, tick, "Clock discontinuity");
    }

    /// Freeze playing time. No-op if already paused.
    pub fn pause(&self) {
        let mut state = self.playing.write();
        if !state.is_paused() {
            state.pause(self.reference.time(true));
        }
    }

    /// Continue from where playing time was frozen. No-op if not paused.
    pub fn resume(&self) {
        let mut state = self.playing.write();
        if state.is_paused() {
            state.resume(self.reference.time(true));
        }
    }

    /// Whether playing time is frozen.
    pub fn is_paused(&self) -> bool {
        self.playing.read().is_paused()
    }

    // Refresh-rate compensation

    /// Set the ceiling for weight snapping, in percent. Returns whether
    /// compensation is currently engaged.
    pub fn set_max_speed_adjust(&self, percent: f64) -> ClockResult<bool> {
        let mut adjust = self.speed_adjust.lock();
        adjust.set_max_adjust_percent(percent)?;
        Ok(adjust.is_active())
    }

    /// Whether refresh-rate compensation is engaged.
    pub fn speed_adjust_active(&self) -> bool {
        self.speed_adjust.lock().is_active()
    }

    /// Feed the current media frame rate.
    ///
    /// `fps == 0` means no video is playing and disengages compensation.
    /// Returns `None` when compensation is not running, either because there
    /// is no video or because the reference reports no refresh rate; in the
    /// latter case the previous state is left untouched.
    pub fn update_framerate(&self, fps: f64) -> Option<FramerateUpdate> {
        if !is_video_framerate(fps) {
            let mut adjust = self.speed_adjust.lock();
            if adjust.is_active() {
                tracing::info!("Refresh rate compensation disengaged");
            }
            adjust.set_active(false);
            return None;
        }

        let refresh = self.reference.refresh_rate()?;

        let (weight, speed) = {
            let mut adjust = self.speed_adjust.lock();
            if !adjust.is_active() {
                tracing::info!(
                    fps,
                    refresh_rate_hz = refresh.hz,
                    "Refresh rate compensation engaged"
                );
            }
            adjust.set_active(true);

            let weight = frame_weight(refresh.hz, fps, adjust.max_adjust_percent());
            (weight, compensated_speed(refresh.hz, fps, weight))
        };

        self.reference.set_speed(speed);
        tracing::trace!(fps, weight, speed, "Reference clock speed compensated");

        Some(FramerateUpdate {
            refresh,
            weight,
            speed,
        })
    }
}

impl std::fmt::Debug for PresentationClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationClock")
            .field("reference", &self.reference.name())
            .field("frequency", &self.frequency)
            .field("playing", &*self.playing.read())
            .field("speed_adjust", &*self.speed_adjust.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presclock_reference::FakeReferenceClock;

    const HZ: u64 = 1_000_000;

    fn fake_clock() -> (Arc<FakeReferenceClock>, PresentationClock) {
        fake_clock_at_refresh(0)
    }

    fn fake_clock_at_refresh(refresh_rate_hz: u32) -> (Arc<FakeReferenceClock>, PresentationClock) {
        let reference = Arc::new(
            FakeReferenceClock::new(HZ)
                .unwrap()
                .with_refresh_rate(refresh_rate_hz)
                .unwrap(),
        );
        let clock = PresentationClock::with_time_base(reference.clone(), Arc::new(TimeBase::new()));
        (reference, clock)
    }

    #[test]
    fn construction_establishes_time_base() {
        let reference = Arc::new(FakeReferenceClock::new(HZ).unwrap());
        reference.set_time(250_000);
        let base = Arc::new(TimeBase::new());
        let clock = PresentationClock::with_time_base(reference.clone(), base.clone());

        assert_eq!(base.get().unwrap().epoch, 250_000);
        assert_eq!(clock.absolute_clock(true), 0.0);
        reference.advance(500_000);
        assert!((clock.absolute_clock(true) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn first_reading_starts_playing_clock() {
        let (reference, clock) = fake_clock();
        reference.set_time(3_000_000);
        assert_eq!(clock.clock(true), 0.0);
        reference.advance(1_500_000);
        assert!((clock.clock(true) - 1.5).abs() < 1e-12);
        assert_eq!(clock.speed(), PlaySpeed::NORMAL);
    }

    #[test]
    fn discontinuity_then_one_second() {
        let (reference, clock) = fake_clock();
        clock.discontinuity(5.0);
        assert_eq!(clock.clock(true), 5.0);
        reference.advance(1_000_000);
        assert_eq!(clock.clock(true), 6.0);
    }

    #[test]
    fn joint_reading_uses_one_sample() {
        let (reference, clock) = fake_clock();
        clock.discontinuity(10.0);
        reference.advance(2_000_000);
        let reading = clock.clock_with_absolute(true);
        assert_eq!(reading.playing, 12.0);
        assert_eq!(reading.absolute, 2.0);
    }

    #[test]
    fn pause_and_resume_through_speed_and_calls() {
        let (reference, clock) = fake_clock();
        clock.clock(true);
        reference.advance(1_000_000);

        clock.pause();
        assert!(clock.is_paused());
        reference.advance(4_000_000);
        assert_eq!(clock.clock(true), 1.0);

        clock.resume();
        assert!(!clock.is_paused());
        assert_eq!(clock.clock(true), 1.0);

        clock.set_speed(PlaySpeed::PAUSE);
        assert!(clock.is_paused());
        assert_eq!(clock.speed(), PlaySpeed::PAUSE);
        reference.advance(1_000_000);
        clock.set_speed(PlaySpeed::NORMAL);
        assert_eq!(clock.clock(true), 1.0);
    }

    #[test]
    fn absolute_clock_ignores_playback_state() {
        let (reference, clock) = fake_clock();
        clock.set_speed(PlaySpeed::new(4000));
        clock.pause();
        reference.advance(2_000_000);
        assert_eq!(clock.absolute_clock(true), 2.0);
    }

    #[test]
    fn next_tick_and_wait_in_absolute_time() {
        let (reference, clock) = fake_clock();
        assert_eq!(clock.next_absolute_clock_tick(0.01), None);

        reference.set_refresh_rate(50).unwrap();
        assert_eq!(clock.next_absolute_clock_tick(0.01), Some(0.02));

        let waited = clock.wait_absolute_clock(0.25, None);
        assert!(waited.reached);
        assert_eq!(waited.absolute, 0.25);
        assert_eq!(waited.waited, 0.25);
    }

    #[test]
    fn plain_absolute_reading_sits_on_refresh_boundaries() {
        let (reference, clock) = fake_clock_at_refresh(50);
        let mapping = clock.tick_mapping();
        let mut last_plain = clock.absolute_clock(false);

        for tick in [7_000, 19_999, 20_000, 45_500, 61_000, 99_999, 140_001] {
            reference.set_time(tick);
            let plain = clock.absolute_clock(false);
            let interpolated = clock.absolute_clock(true);

            assert_eq!(mapping.ticks_from_absolute(plain) % 20_000, 0);
            assert!(plain <= interpolated);
            assert!(plain >= last_plain);
            last_plain = plain;
        }
    }

    #[test]
    fn plain_playing_reading_lags_interpolated() {
        let (reference, clock) = fake_clock_at_refresh(50);
        clock.discontinuity(1.0);
        reference.set_time(30_000);
        assert!((clock.clock(false) - 1.02).abs() < 1e-12);
        assert!((clock.clock(true) - 1.03).abs() < 1e-12);
    }

    #[test]
    fn backwards_reference_is_reported_without_side_effects() {
        let (reference, clock) = fake_clock();
        clock.discontinuity(2.0);
        reference.set_time(3_000_000);
        assert_eq!(clock.absolute_clock(true), 3.0);

        reference.set_time(1_000_000);
        assert_eq!(clock.absolute_clock(true), 1.0);
        assert_eq!(clock.last_interpolated.load(Ordering::Relaxed), 3_000_000);
        assert!(!clock.is_paused());
        assert_eq!(clock.speed(), PlaySpeed::NORMAL);
        assert_eq!(clock.clock(true), 3.0);

        reference.set_time(4_000_000);
        assert_eq!(clock.absolute_clock(true), 4.0);
        assert_eq!(clock.clock(true), 6.0);
        assert_eq!(clock.last_interpolated.load(Ordering::Relaxed), 4_000_000);
    }

    #[test]
    fn playing_reads_do_not_track_backwards_ticks() {
        let (reference, clock) = fake_clock();
        reference.set_time(2_000_000);
        clock.clock(true);
        clock.clock_with_absolute(true);
        assert_eq!(clock.last_interpolated.load(Ordering::Relaxed), Tick::MIN);
    }

    #[test]
    fn unbounded_targets_saturate_instead_of_overflowing() {
        let reference = Arc::new(
            FakeReferenceClock::new(HZ)
                .unwrap()
                .with_refresh_rate(60)
                .unwrap(),
        );
        reference.set_time(5_000);
        let clock = PresentationClock::with_time_base(reference.clone(), Arc::new(TimeBase::new()));
        assert_eq!(clock.tick_mapping().epoch, 5_000);

        let next = clock.next_absolute_clock_tick(f64::INFINITY).unwrap();
        assert!(next.is_finite());
        assert!(next > 9.0e12);

        let waited = clock.wait_absolute_clock(1e13, None);
        assert!(waited.reached);
        assert_eq!(reference.time(true), Tick::MAX);
        assert!(waited.absolute > 9.0e12);
        assert!(waited.waited > 9.0e12);
    }

    #[test]
    fn framerate_zero_disengages() {
        let (_, clock) = fake_clock_at_refresh(60);

        assert!(clock.update_framerate(25.0).is_some());
        assert!(clock.speed_adjust_active());
        assert_eq!(clock.update_framerate(0.0), None);
        assert!(!clock.speed_adjust_active());
    }

    #[test]
    fn missing_refresh_rate_leaves_state_untouched() {
        let (reference, clock) = fake_clock_at_refresh(60);
        clock.update_framerate(30.0).unwrap();
        let requests = reference.speed_requests();

        reference.set_refresh_rate(0).unwrap();
        assert_eq!(clock.update_framerate(30.0), None);
        assert!(clock.speed_adjust_active());
        assert_eq!(reference.speed_requests(), requests);
    }

    #[test]
    fn framerate_update_pushes_speed_to_reference() {
        let (reference, clock) = fake_clock_at_refresh(60);
        assert!(!clock.set_max_speed_adjust(5.0).unwrap());

        let update = clock.update_framerate(23.976).unwrap();
        assert_eq!(update.refresh.hz, 60);
        assert!((update.refresh.interval_secs - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(update.weight, 2.5);
        assert_eq!(reference.speed(), update.speed);
        assert!(clock.set_max_speed_adjust(5.0).unwrap());
    }

    #[test]
    fn invalid_speed_adjust_rejected() {
        let (_, clock) = fake_clock();
        assert!(clock.set_max_speed_adjust(-2.0).is_err());
        assert!(clock.set_max_speed_adjust(f64::NAN).is_err());
    }
}
