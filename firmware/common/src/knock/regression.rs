//! Ignition retard regression.
//!
//! Retard steps up on each consumed detection and decays linearly with time
//! otherwise. A single update either steps or decays, never both.

use crate::config::RETARD_MAX_PERCENT;
use crate::time::{TickTracker, Ticks};

#[derive(Clone, Copy, Debug)]
pub struct RetardRegression {
    retard_percent: f32,
    step_percent: f32,
    decay_percent_per_sec: f32,
    tracker: TickTracker,
}

impl RetardRegression {
    pub const fn new(
        step_percent: f32,
        decay_percent_per_sec: f32,
        ticks_per_ms: u32,
    ) -> Self {
        Self {
            retard_percent: 0.0,
            step_percent,
            decay_percent_per_sec,
            tracker: TickTracker::new(ticks_per_ms),
        }
    }

    /// Zero the output and restart time measurement at `now`.
    pub fn reset(
        &mut self,
        now: Ticks,
    ) {
        self.retard_percent = 0.0;
        self.tracker.reset(now);
    }

    /// Advance one main-loop tick.
    ///
    /// `level` is a detection consumed this tick. The elapsed time is tracked
    /// on every call, so a step does not bank decay for the next tick.
    pub fn update(
        &mut self,
        level: Option<u8>,
        now: Ticks,
    ) -> f32 {
        self.tracker.update(now);
        if let Some(level) = level {
            let stepped = self.retard_percent + self.step_percent * f32::from(level);
            self.retard_percent = stepped.min(RETARD_MAX_PERCENT);
        } else if self.retard_percent > 0.0 {
            let decay = self.tracker.difference_ms() * self.decay_percent_per_sec / 1000.0;
            self.retard_percent = (self.retard_percent - decay).max(0.0);
        }
        self.retard_percent
    }

    #[inline]
    pub const fn retard_percent(&self) -> f32 { self.retard_percent }

    /// Output for the CAN frame composer, truncated.
    #[inline]
    pub fn retard_percent_u8(&self) -> u8 { self.retard_percent as u8 }
}
