//! Process-wide mapping from reference ticks to absolute time.
//!
//! The mapping (tick frequency plus the tick treated as time zero) is set
//! exactly once, lazily, from the first provider that asks for it, and is
//! immutable afterwards. Every clock query reads it, so it sits behind a
//! reader/writer lock that is only upgraded for that first initialization.
//!
//! Callers that need a deterministic epoch can instead build a
//! [`TimeBase`] with [`TimeBase::with_mapping`] before any thread starts.

use std::num::NonZeroU64;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use presclock_common::clock::{secs_to_ticks, ticks_to_secs, Tick};
use presclock_reference::ReferenceClock;

static GLOBAL: OnceLock<Arc<TimeBase>> = OnceLock::new();

/// Immutable tick-to-absolute-time mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickMapping {
    /// Ticks per second of the reference clock.
    pub frequency: NonZeroU64,
    /// Tick value treated as absolute time zero.
    pub epoch: Tick,
}

impl TickMapping {
    /// Absolute time in seconds for a reference tick.
    pub fn absolute_from_ticks(&self, tick: Tick) -> f64 {
        ticks_to_secs(tick.saturating_sub(self.epoch), self.frequency)
    }

    /// Reference tick for an absolute time, rounded to the nearest tick.
    /// Times beyond the tick range (including infinities) saturate.
    pub fn ticks_from_absolute(&self, absolute: f64) -> Tick {
        secs_to_ticks(absolute, self.frequency).saturating_add(self.epoch)
    }
}

#[derive(Debug, Clone, Copy)]
struct Established {
    mapping: TickMapping,
    at: DateTime<Utc>,
}

/// Lazily initialized, shared tick mapping.
#[derive(Debug, Default)]
pub struct TimeBase {
    inner: RwLock<Option<Established>>,
}

impl TimeBase {
    /// An empty time base; the first [`TimeBase::mapping`] call fills it.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// A time base fixed up front.
    pub fn with_mapping(mapping: TickMapping) -> Self {
        Self {
            inner: RwLock::new(Some(Established {
                mapping,
                at: Utc::now(),
            })),
        }
    }

    /// The process-wide time base shared by every clock built with
    /// `PresentationClock::new`.
    pub fn global() -> Arc<TimeBase> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TimeBase::new())))
    }

    /// The mapping, establishing it from `reference` on first use.
    ///
    /// The lock is released before this returns.
    pub fn mapping(&self, reference: &dyn ReferenceClock) -> TickMapping {
        if let Some(established) = *self.inner.read() {
            return established.mapping;
        }

        let guard = self.inner.upgradable_read();
        if let Some(established) = *guard {
            return established.mapping;
        }

        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        let established = Established {
            mapping: TickMapping {
                frequency: reference.frequency(),
                epoch: reference.time(true),
            },
            at: Utc::now(),
        };
        *guard = Some(established);

        tracing::info!(
            provider = reference.name(),
            frequency = established.mapping.frequency.get(),
            epoch = established.mapping.epoch,
            at = %established.at.to_rfc3339(),
            "Established reference time base"
        );
        established.mapping
    }

    /// The mapping if it has been established.
    pub fn get(&self) -> Option<TickMapping> {
        self.inner.read().map(|established| established.mapping)
    }

    /// Wall-clock time at which the mapping was established.
    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().map(|established| established.at)
    }
}
