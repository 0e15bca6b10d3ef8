//! Monotonic tick tracking with rollover handling.
//!
//! The hardware tick counter is a free-running 32-bit value. It wraps at
//! different intervals depending on the tick rate:
//! - 1 kHz (millisecond tick): every ~49.7 days
//! - 1 MHz (microsecond tick): every ~71.6 minutes
//!
//! All deltas use `wrapping_sub`, so a single wrap between two updates is
//! measured correctly. Two wraps between updates cannot be detected; callers
//! update far more often than that.

/// Raw value of the free-running hardware tick counter.
pub type Ticks = u32;

/// Measures the time between consecutive updates.
///
/// Shared by the retard regression (time-proportional decay) and by the
/// module watchdogs (timeout detection).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickTracker {
    /// Last observed counter value.
    previous_tick: Ticks,
    /// Delta between the last two updates, rollover-corrected.
    difference: Ticks,
    /// Conversion factor from ticks to milliseconds.
    ticks_per_ms: u32,
}

impl TickTracker {
    /// Create a tracker for a counter running at `ticks_per_ms` ticks per millisecond.
    ///
    /// A factor of zero is treated as one (millisecond tick).
    pub const fn new(ticks_per_ms: u32) -> Self {
        Self {
            previous_tick: 0,
            difference: 0,
            ticks_per_ms: if ticks_per_ms == 0 { 1 } else { ticks_per_ms },
        }
    }

    /// Restart measuring from `now` without producing a delta.
    pub fn reset(
        &mut self,
        now: Ticks,
    ) {
        self.previous_tick = now;
        self.difference = 0;
    }

    /// Record `now` and return the ticks elapsed since the previous update.
    pub fn update(
        &mut self,
        now: Ticks,
    ) -> Ticks {
        self.difference = now.wrapping_sub(self.previous_tick);
        self.previous_tick = now;
        self.difference
    }

    /// Ticks elapsed since the last update, without recording `now`.
    #[inline]
    pub const fn elapsed(
        &self,
        now: Ticks,
    ) -> Ticks {
        now.wrapping_sub(self.previous_tick)
    }

    /// Milliseconds elapsed since the last update, without recording `now`.
    #[inline]
    pub const fn elapsed_ms(
        &self,
        now: Ticks,
    ) -> u32 {
        self.elapsed(now) / self.ticks_per_ms
    }

    /// Last measured delta in ticks.
    #[inline]
    pub const fn difference(&self) -> Ticks { self.difference }

    /// Last measured delta in milliseconds (fractional).
    #[inline]
    pub fn difference_ms(&self) -> f32 { self.difference as f32 / self.ticks_per_ms as f32 }

}

impl Default for TickTracker {
    fn default() -> Self { Self::new(1) }
}

// =============================================================================
// Unit Tests
// =============================================================================
