//! Playing-time state machine.
//!
//! Maps reference ticks to the media time shown to the user. Every
//! transition (speed change, pause, resume, discontinuity) re-derives the
//! start tick so the playing time at the transition tick is unchanged.

use std::num::NonZeroU64;

use presclock_common::clock::Tick;

use crate::speed::PlaySpeed;

/// Per-clock playing-time state. Pure: every operation takes the current
/// reference tick as input.
#[derive(Debug, Clone)]
pub struct PlayingState {
    /// Reference frequency divided by the speed multiplier.
    scaled_frequency: f64,
    /// Tick at which playing time (before the discontinuity offset) is zero.
    start_tick: Tick,
    /// Tick at which the clock was paused.
    pause_tick: Option<Tick>,
    /// Playing time supplied by the last discontinuity.
    discontinuity: f64,
    needs_reset: bool,
    speed: PlaySpeed,
}

impl PlayingState {
    pub fn new(frequency: NonZeroU64) -> Self {
        Self {
            scaled_frequency: frequency.get() as f64,
            start_tick: 0,
            pause_tick: None,
            discontinuity: 0.0,
            needs_reset: true,
            speed: PlaySpeed::NORMAL,
        }
    }

    /// Whether the next reading must re-base the clock.
    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    /// Re-base so that `tick` is playing time zero at normal speed.
    pub fn reset(&mut self, tick: Tick, frequency: NonZeroU64) {
        self.start_tick = tick;
        self.scaled_frequency = frequency.get() as f64;
        self.speed = PlaySpeed::NORMAL;
        self.pause_tick = None;
        self.discontinuity = 0.0;
        self.needs_reset = false;
    }

    /// Playing time in seconds at `tick`. While paused, the pause tick is
    /// used instead.
    pub fn playing_at(&self, tick: Tick) -> f64 {
        let current = self.pause_tick.unwrap_or(tick);
        (current - self.start_tick) as f64 / self.scaled_frequency + self.discontinuity
    }

    /// Apply a new playback speed at `tick`.
    pub fn set_speed(&mut self, speed: PlaySpeed, tick: Tick, frequency: NonZeroU64) {
        self.speed = speed;

        if speed.is_pause() {
            self.pause(tick);
            return;
        }

        self.resume(tick);

        let new_frequency = frequency.get() as f64 / speed.multiplier();
        let elapsed = (tick - self.start_tick) as f64;
        self.start_tick = tick - (elapsed * new_frequency / self.scaled_frequency).round() as Tick;
        self.scaled_frequency = new_frequency;
    }

    /// Re-base at `tick` so that playing time there equals `playing_time`.
    /// A pause in progress stays in effect, frozen at the new value.
    pub fn discontinuity(&mut self, playing_time: f64, tick: Tick) {
        self.start_tick = tick;
        if self.pause_tick.is_some() {
            self.pause_tick = Some(tick);
        }
        self.discontinuity = playing_time;
        self.needs_reset = false;
    }

    /// Freeze playing time at `tick`. No-op if already paused.
    pub fn pause(&mut self, tick: Tick) {
        if self.pause_tick.is_none() {
            self.pause_tick = Some(tick);
        }
    }

    /// Fold the paused interval into the start tick. No-op if not paused.
    pub fn resume(&mut self, tick: Tick) {
        if let Some(pause_tick) = self.pause_tick.take() {
            self.start_tick += tick - pause_tick;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause_tick.is_some()
    }

    /// Last requested speed, including the pause sentinel.
    pub fn speed(&self) -> PlaySpeed {
        self.speed
    }
}
