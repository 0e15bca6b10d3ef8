//! Knock evaluation: magnitude + engine speed -> pending severity level.

use super::threshold::{ThresholdTable, interpolate};
use crate::config::{ConfigError, IDLE_RPM, KnockConfig, RPM_OFFSET};
use crate::time::{Deadline, Ticks};

/// Grades knock magnitudes and holds at most one pending detection.
///
/// A detection arms a one-revolution window. Until the regression consumes
/// the detection after that window, further detections are suppressed.
#[derive(Clone, Debug)]
pub struct KnockDetector {
    table: ThresholdTable,
    level_max: u8,
    pulses_per_revolution: u32,
    ticks_per_ms: u32,
    level_pending: bool,
    pending_level: u8,
    window: Deadline,
    detections: u32,
}

impl KnockDetector {
    pub fn new(
        config: &KnockConfig,
        ticks_per_ms: u32,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table: ThresholdTable::new(&config.thresholds)?,
            level_max: config.knock_level_max,
            pulses_per_revolution: config.pulses_per_revolution,
            ticks_per_ms: ticks_per_ms.max(1),
            level_pending: false,
            pending_level: 0,
            window: Deadline::new(),
            detections: 0,
        })
    }

    /// Drop any pending detection.
    pub fn reset(&mut self) {
        self.level_pending = false;
        self.pending_level = 0;
        self.window.disarm();
    }

    /// Interpolated `(min, max)` thresholds, or `None` at idle.
    pub fn thresholds_at(
        &self,
        rpm: f32,
    ) -> Option<(f32, f32)> {
        // Written so NaN counts as idle
        if !(rpm >= IDLE_RPM) {
            return None;
        }
        Some(self.table.lookup(rpm - RPM_OFFSET))
    }

    /// Severity for `magnitude` between the thresholds, `1..=level_max`.
    fn grade(
        &self,
        magnitude: f32,
        min: f32,
        max: f32,
    ) -> u8 {
        let top = f32::from(self.level_max);
        if magnitude >= max {
            return self.level_max;
        }
        let level = interpolate(magnitude, min, 1.0, max, top).clamp(1.0, top);
        // Truncation toward zero, as the CAN output
        level as u8
    }

    /// Length of the detection window at `rpm`, in ticks.
    fn window_ticks(
        &self,
        rpm: f32,
    ) -> Ticks {
        let ms = 60_000.0 * self.pulses_per_revolution as f32 / rpm;
        (ms as u32).saturating_mul(self.ticks_per_ms)
    }

    /// Evaluate one magnitude reading. Returns true on a new detection.
    pub fn evaluate(
        &mut self,
        magnitude: f32,
        rpm: f32,
        now: Ticks,
    ) -> bool {
        let Some((min, max)) = self.thresholds_at(rpm) else {
            return false;
        };
        if self.level_pending || !(magnitude > min) {
            return false;
        }
        self.pending_level = self.grade(magnitude, min, max);
        self.level_pending = true;
        self.window.arm(now, self.window_ticks(rpm));
        self.detections = self.detections.wrapping_add(1);
        true
    }

    /// Hand out the pending level once its window has elapsed.
    pub fn consume_elapsed(
        &mut self,
        now: Ticks,
    ) -> Option<u8> {
        if !self.level_pending || !self.window.is_done(now) {
            return None;
        }
        let level = self.pending_level;
        self.reset();
        Some(level)
    }

    #[inline]
    pub const fn is_level_pending(&self) -> bool { self.level_pending }

    /// Severity of the pending detection, 0 when none.
    #[inline]
    pub const fn pending_level(&self) -> u8 { self.pending_level }

    /// Detections since boot.
    #[inline]
    pub const fn detections(&self) -> u32 { self.detections }
}

// =============================================================================
// Unit Tests
// =============================================================================
