//! presclock
//!
//! A presentation clock for media playback. It converts a free-running
//! reference clock's ticks into three time domains:
//!
//! - **Absolute time:** wall-clock-like seconds, independent of playback
//! - **Playing time:** media position, pausable, speed-scaled, re-based on
//!   discontinuities
//! - **Refresh compensation:** a small speed skew on the reference clock so
//!   frames land on display refresh boundaries
//!
//! The clock is shared by the audio, video, demuxer and UI threads; every
//! method takes `&self`.

pub mod clock;
pub mod playing;
pub mod speed;
pub mod speed_adjust;
pub mod time_base;

pub use clock::{ClockReading, PresentationClock, WaitedClock};
pub use playing::PlayingState;
pub use speed::PlaySpeed;
pub use speed_adjust::{FramerateUpdate, SpeedAdjust, MIN_SPEED_ADJUST_PERCENT};
pub use time_base::{TickMapping, TimeBase};

pub use presclock_common::clock::Tick;
pub use presclock_reference::{
    FakeReferenceClock, ReferenceClock, RefreshRate, SystemReferenceClock, Waited,
};
