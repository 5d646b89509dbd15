//! Refresh-rate speed compensation.
//!
//! When the display refresh rate is not a whole multiple of the media frame
//! rate, the reference clock is nudged so each frame lands on a refresh
//! boundary. How far the frame-to-refresh weight may be snapped to a whole
//! number is capped by a user-configured percentage.

use presclock_common::clock::round_int;
use presclock_common::error::{ClockError, ClockResult};
use presclock_reference::RefreshRate;

/// Ceilings at or below this percentage disable weight snapping.
pub const MIN_SPEED_ADJUST_PERCENT: f64 = 0.05;

/// Compensation settings and engagement flag. Guarded by its own lock,
/// separate from the playing-time state.
#[derive(Debug, Clone, Default)]
pub struct SpeedAdjust {
    max_adjust_percent: f64,
    active: bool,
}

impl SpeedAdjust {
    pub fn new(max_adjust_percent: f64) -> ClockResult<Self> {
        let mut adjust = Self::default();
        adjust.set_max_adjust_percent(max_adjust_percent)?;
        Ok(adjust)
    }

    pub fn max_adjust_percent(&self) -> f64 {
        self.max_adjust_percent
    }

    pub fn set_max_adjust_percent(&mut self, percent: f64) -> ClockResult<()> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(ClockError::invalid_speed_adjust(format!(
                "max speed adjust must be a non-negative percentage, got {percent}"
            )));
        }
        self.max_adjust_percent = percent;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Result of a framerate update while the reference clock is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramerateUpdate {
    /// Refresh rate and interval reported by the reference clock.
    pub refresh: RefreshRate,
    /// Refresh cycles per media frame, after snapping.
    pub weight: f64,
    /// Speed pushed to the reference clock.
    pub speed: f64,
}

/// Whether `fps` describes active video.
pub fn is_video_framerate(fps: f64) -> bool {
    fps.is_finite() && round_int(fps) > 0
}

/// Refresh cycles per media frame.
///
/// The raw weight is `refresh / round(fps)`. If `max_adjust_percent` exceeds
/// [`MIN_SPEED_ADJUST_PERCENT`] and the weight is within that percentage of
/// its nearest whole number, the whole number is used.
pub fn frame_weight(refresh_hz: u32, fps: f64, max_adjust_percent: f64) -> f64 {
    let weight = refresh_hz as f64 / round_int(fps) as f64;

    if max_adjust_percent > MIN_SPEED_ADJUST_PERCENT {
        let nearest = round_int(weight);
        if nearest > 0 {
            let ratio = weight / nearest as f64;
            let tolerance = max_adjust_percent / 100.0;
            if ratio < 1.0 + tolerance && ratio > 1.0 - tolerance {
                return nearest as f64;
            }
        }
    }
    weight
}

/// Reference clock speed that puts `fps` frames on `refresh_hz` boundaries.
pub fn compensated_speed(refresh_hz: u32, fps: f64, weight: f64) -> f64 {
    refresh_hz as f64 / (fps * weight)
}
