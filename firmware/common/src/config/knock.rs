//! Knock detection calibration.
//!
//! Compile-time constants carry `const` assertions so an inconsistent edit
//! fails the build. The runtime `KnockConfig` record holds the values that
//! are calibrated per engine and may come from a flash calibration blob.

use heapless::Vec;

use super::ConfigError;
use crate::knock::ThresholdPoint;

// =============================================================================
// Spectral Pipeline
// =============================================================================

/// Real FFT transform length in samples.
pub const FFT_LEN: usize = 2048;

/// Number of complex output bins of the real FFT.
pub const FFT_BINS: usize = FFT_LEN / 2;

const _: () = assert!(FFT_LEN.is_power_of_two());

/// Samples delivered per DMA half-buffer completion.
pub const ADC_HALF_BUFFER_LEN: usize = 512;

const _: () = assert!(ADC_HALF_BUFFER_LEN <= FFT_LEN);

// =============================================================================
// Evaluation
// =============================================================================

/// Below this engine speed no evaluation happens (idle vibration is not knock).
pub const IDLE_RPM: f32 = 750.0;

/// Subtracted from the engine speed before the threshold table lookup.
pub const RPM_OFFSET: f32 = 500.0;

const _: () = assert!(IDLE_RPM > RPM_OFFSET);

/// Highest severity level a detection can be graded with.
pub const KNOCK_LEVEL_MAX: u8 = 5;

/// Maximum number of calibrated threshold breakpoints.
pub const MAX_THRESHOLD_POINTS: usize = 16;

/// Table capacity: calibrated breakpoints plus the synthetic 0 and +inf entries.
pub const THRESHOLD_TABLE_LEN: usize = MAX_THRESHOLD_POINTS + 2;

// =============================================================================
// Retard Regression
// =============================================================================

/// Upper clamp of the ignition retard output.
pub const RETARD_MAX_PERCENT: f32 = 100.0;

/// Default retard added per severity level on a consumed detection.
pub const DEFAULT_RETARD_STEP_PERCENT: f32 = 2.0;

/// Default retard decay rate.
pub const DEFAULT_DECAY_PERCENT_PER_SEC: f32 = 5.0;

/// Default knock resonance frequency of the engine block.
pub const DEFAULT_KNOCK_FREQUENCY_HZ: f32 = 6_700.0;

/// Default ignition pulses per crank revolution.
///
/// Two pulses reproduce the `120000 / rpm` detection window of the legacy
/// board. Verify against the ignition reference sensor of the vehicle.
pub const DEFAULT_PULSES_PER_REVOLUTION: u32 = 2;

/// Default breakpoints, indexed by `rpm - RPM_OFFSET`, in raw FFT magnitude.
pub const DEFAULT_THRESHOLDS: [ThresholdPoint; 6] = [
    ThresholdPoint::new(500.0, 30_000.0, 90_000.0),
    ThresholdPoint::new(1_500.0, 45_000.0, 130_000.0),
    ThresholdPoint::new(2_500.0, 60_000.0, 180_000.0),
    ThresholdPoint::new(3_500.0, 80_000.0, 240_000.0),
    ThresholdPoint::new(4_500.0, 100_000.0, 300_000.0),
    ThresholdPoint::new(6_000.0, 130_000.0, 380_000.0),
];

const _: () = assert!(DEFAULT_THRESHOLDS.len() <= MAX_THRESHOLD_POINTS);

// =============================================================================
// Runtime Calibration Record
// =============================================================================

/// Per-engine knock calibration.
#[derive(Clone, Debug, PartialEq)]
pub struct KnockConfig {
    /// Knock resonance frequency in Hz.
    pub knock_frequency_hz: f32,
    /// Retard added per severity level of a consumed detection, in percent.
    pub retard_step_percent: f32,
    /// Continuous retard decay in percent per second.
    pub decay_percent_per_sec: f32,
    /// Severity assigned to a magnitude at or above the maximum threshold.
    pub knock_level_max: u8,
    /// Ignition pulses per crank revolution, sizes the detection window.
    pub pulses_per_revolution: u32,
    /// Threshold breakpoints, strictly ascending in RPM.
    pub thresholds: Vec<ThresholdPoint, MAX_THRESHOLD_POINTS>,
}

impl KnockConfig {
    /// Check the record for values the engine cannot run with.
    ///
    /// The knock frequency is checked against the sampling timer at start,
    /// see [`KnockConfig::validate_for_sample_rate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.knock_level_max == 0 {
            return Err(ConfigError::ZeroKnockLevel);
        }
        if !(self.retard_step_percent.is_finite() && self.retard_step_percent > 0.0) {
            return Err(ConfigError::InvalidRetardStep);
        }
        if !(self.decay_percent_per_sec.is_finite() && self.decay_percent_per_sec >= 0.0) {
            return Err(ConfigError::InvalidDecayRate);
        }
        if self.pulses_per_revolution == 0 {
            return Err(ConfigError::InvalidPulsesPerRevolution);
        }
        crate::knock::ThresholdTable::new(&self.thresholds).map(|_| ())
    }

    /// Check the knock frequency against the sampling timer frequency.
    pub fn validate_for_sample_rate(
        &self,
        sample_rate_hz: f32,
    ) -> Result<(), ConfigError> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(ConfigError::InvalidSampleRate);
        }
        if !(self.knock_frequency_hz > 0.0 && self.knock_frequency_hz < sample_rate_hz / 2.0) {
            return Err(ConfigError::KnockFrequencyAboveNyquist);
        }
        Ok(())
    }
}

impl Default for KnockConfig {
    fn default() -> Self {
        let mut thresholds = Vec::new();
        for point in DEFAULT_THRESHOLDS {
            // Capacity is checked by a const assertion above
            let _ = thresholds.push(point);
        }
        Self {
            knock_frequency_hz: DEFAULT_KNOCK_FREQUENCY_HZ,
            retard_step_percent: DEFAULT_RETARD_STEP_PERCENT,
            decay_percent_per_sec: DEFAULT_DECAY_PERCENT_PER_SEC,
            knock_level_max: KNOCK_LEVEL_MAX,
            pulses_per_revolution: DEFAULT_PULSES_PER_REVOLUTION,
            thresholds,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(KnockConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_default_thresholds_loaded() {
        let config = KnockConfig::default();
        assert_eq!(config.thresholds.len(), DEFAULT_THRESHOLDS.len());
    }

    #[test]
    fn test_zero_level_rejected() {
        let config = KnockConfig {
            knock_level_max: 0,
            ..KnockConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroKnockLevel));
    }

    #[test]
    fn test_negative_decay_rejected() {
        let config = KnockConfig {
            decay_percent_per_sec: -1.0,
            ..KnockConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidDecayRate));
    }

    #[test]
    fn test_zero_pulses_rejected() {
        let config = KnockConfig {
            pulses_per_revolution: 0,
            ..KnockConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidPulsesPerRevolution));
    }

    #[test]
    fn test_empty_table_rejected() {
        let config = KnockConfig {
            thresholds: Vec::new(),
            ..KnockConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyThresholdTable));
    }

    #[test]
    fn test_nyquist_check() {
        let config = KnockConfig::default();
        assert_eq!(config.validate_for_sample_rate(40_000.0), Ok(()));
        assert_eq!(
            config.validate_for_sample_rate(10_000.0),
            Err(ConfigError::KnockFrequencyAboveNyquist),
            "6.7 kHz cannot be resolved at 10 kHz sampling"
        );
        assert_eq!(config.validate_for_sample_rate(0.0), Err(ConfigError::InvalidSampleRate));
    }
}
