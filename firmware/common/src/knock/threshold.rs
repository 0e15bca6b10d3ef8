//! RPM-indexed knock threshold table.
//!
//! Breakpoints are `(x, min, max)` triples with `x = rpm - RPM_OFFSET`. The
//! table stores the calibrated breakpoints between two synthetic entries at
//! `x = 0` and `x = +inf` that repeat the outer values, so a lookup outside
//! the calibrated range clamps to the nearest breakpoint instead of
//! extrapolating.

use heapless::Vec;

use crate::config::{ConfigError, MAX_THRESHOLD_POINTS, THRESHOLD_TABLE_LEN};

/// One calibrated breakpoint.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThresholdPoint {
    /// Offset engine speed (`rpm - RPM_OFFSET`).
    pub x: f32,
    /// Magnitude above which a detection is raised (severity 1).
    pub min: f32,
    /// Magnitude graded with the maximum severity.
    pub max: f32,
}

impl ThresholdPoint {
    pub const fn new(
        x: f32,
        min: f32,
        max: f32,
    ) -> Self {
        Self { x, min, max }
    }
}

/// Linear interpolation of `x` between `(x0, y0)` and `(x1, y1)`.
///
/// A degenerate interval (`x0 == x1`) or an infinite upper breakpoint
/// yields `y0`.
#[inline]
pub fn interpolate(
    x: f32,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
) -> f32 {
    let span = x1 - x0;
    if !span.is_finite() || span == 0.0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / span
}

/// Validated breakpoint table with synthetic boundary entries.
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdTable {
    points: Vec<ThresholdPoint, THRESHOLD_TABLE_LEN>,
}

impl ThresholdTable {
    /// Build the table from calibrated breakpoints.
    ///
    /// Breakpoints must be non-empty, strictly ascending in `x`, finite and
    /// non-negative, with `min <= max`.
    pub fn new(calibrated: &[ThresholdPoint]) -> Result<Self, ConfigError> {
        let (Some(first), Some(last)) = (calibrated.first(), calibrated.last()) else {
            return Err(ConfigError::EmptyThresholdTable);
        };
        if calibrated.len() > MAX_THRESHOLD_POINTS {
            return Err(ConfigError::TooManyThresholdPoints);
        }

        let mut prev_x = None;
        for point in calibrated {
            let finite = point.x.is_finite() && point.min.is_finite() && point.max.is_finite();
            if !finite || point.x < 0.0 || point.min < 0.0 {
                return Err(ConfigError::ThresholdNotFinite);
            }
            if point.min > point.max {
                return Err(ConfigError::ThresholdMinAboveMax);
            }
            if prev_x.is_some_and(|prev| point.x <= prev) {
                return Err(ConfigError::ThresholdNotAscending);
            }
            prev_x = Some(point.x);
        }

        let mut points = Vec::new();
        // Capacity holds MAX_THRESHOLD_POINTS plus both boundaries, checked above
        if first.x > 0.0 {
            let _ = points.push(ThresholdPoint::new(0.0, first.min, first.max));
        }
        for point in calibrated {
            let _ = points.push(*point);
        }
        let _ = points.push(ThresholdPoint::new(f32::INFINITY, last.min, last.max));

        Ok(Self { points })
    }

    /// Interpolated `(min, max)` thresholds at offset engine speed `x`.
    ///
    /// Values below zero use the first breakpoint.
    pub fn lookup(
        &self,
        x: f32,
    ) -> (f32, f32) {
        let x = if x > 0.0 { x } else { 0.0 };
        for pair in self.points.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if x <= hi.x {
                return (
                    interpolate(x, lo.x, lo.min, hi.x, hi.min),
                    interpolate(x, lo.x, lo.max, hi.x, hi.max),
                );
            }
        }
        // Unreachable with the +inf boundary, except for NaN input
        self.points.last().map_or((0.0, 0.0), |p| (p.min, p.max))
    }

    /// Table entries including the synthetic boundaries.
    #[inline]
    pub fn points(&self) -> &[ThresholdPoint] { &self.points }
}

// =============================================================================
// Unit Tests
// =============================================================================
