//! Calibration validation errors.

use core::fmt;

/// Reason a calibration record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Threshold table has no breakpoints.
    EmptyThresholdTable,
    /// Threshold table has more breakpoints than `MAX_THRESHOLD_POINTS`.
    TooManyThresholdPoints,
    /// Breakpoint RPM values are not strictly ascending.
    ThresholdNotAscending,
    /// A breakpoint holds NaN, infinity or a negative value.
    ThresholdNotFinite,
    /// A breakpoint's minimum threshold is above its maximum threshold.
    ThresholdMinAboveMax,
    /// Maximum severity level is zero.
    ZeroKnockLevel,
    /// Retard step per severity level is not positive.
    InvalidRetardStep,
    /// Decay rate is negative or not finite.
    InvalidDecayRate,
    /// Ignition pulses per revolution is zero.
    InvalidPulsesPerRevolution,
    /// Sampling frequency is zero or not finite.
    InvalidSampleRate,
    /// Knock frequency is not below the Nyquist frequency of the sampling timer.
    KnockFrequencyAboveNyquist,
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let msg = match self {
            Self::EmptyThresholdTable => "threshold table is empty",
            Self::TooManyThresholdPoints => "threshold table has too many points",
            Self::ThresholdNotAscending => "threshold rpm not ascending",
            Self::ThresholdNotFinite => "threshold value not finite",
            Self::ThresholdMinAboveMax => "threshold min above max",
            Self::ZeroKnockLevel => "knock level max is zero",
            Self::InvalidRetardStep => "retard step must be positive",
            Self::InvalidDecayRate => "decay rate invalid",
            Self::InvalidPulsesPerRevolution => "pulses per revolution is zero",
            Self::InvalidSampleRate => "sampling frequency invalid",
            Self::KnockFrequencyAboveNyquist => "knock frequency above nyquist",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_short() {
        // Messages must fit a log buffer line together with a module name
        let err = ConfigError::KnockFrequencyAboveNyquist;
        assert!(err.to_string().len() < 32);
    }
}
