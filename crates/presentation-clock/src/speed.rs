//! Playback rate encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed playback rate in thousandths of normal speed.
///
/// `NORMAL` is real time, `PAUSE` stops the playing clock, negative values
/// rewind. Fast-forward is any value above `NORMAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaySpeed(i32);

impl PlaySpeed {
    /// Clock stopped.
    pub const PAUSE: PlaySpeed = PlaySpeed(0);
    /// Real time.
    pub const NORMAL: PlaySpeed = PlaySpeed(1000);

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Speed as a multiple of normal, e.g. `2.0` for double speed.
    pub fn from_multiplier(multiplier: f64) -> Self {
        Self((multiplier * Self::NORMAL.0 as f64).round() as i32)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn is_pause(self) -> bool {
        self.0 == Self::PAUSE.0
    }

    pub const fn is_rewind(self) -> bool {
        self.0 < 0
    }

    /// Speed as a multiple of normal.
    pub fn multiplier(self) -> f64 {
        self.0 as f64 / Self::NORMAL.0 as f64
    }
}

impl Default for PlaySpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for PlaySpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pause() {
            write!(f, "paused")
        } else {
            write!(f, "{}x", self.multiplier())
        }
    }
}
