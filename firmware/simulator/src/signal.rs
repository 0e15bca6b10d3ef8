//! Synthetic knock sensor signal.
//!
//! Produces 12-bit ADC codes the way the knock channel sees them: a DC bias,
//! a background vibration tone, and a knock burst at the resonance frequency
//! while knock is active. Sine synthesis uses `micromath` so the signal has
//! the same approximation error as an embedded test generator would.

use core::f32::consts::TAU;

use micromath::F32Ext;

/// ADC mid-scale code (12-bit converter).
const DC_BIAS: f32 = 2048.0;

/// Highest 12-bit ADC code.
const ADC_MAX: f32 = 4095.0;

/// Background engine vibration frequency.
const BACKGROUND_HZ: f32 = 1_200.0;

/// Background engine vibration amplitude in ADC codes.
const BACKGROUND_AMPLITUDE: f32 = 40.0;

pub struct KnockSignal {
    sample_rate_hz: f32,
    knock_hz: f32,
    knock_amplitude: f32,
    background_phase: f32,
    knock_phase: f32,
    samples_due: f32,
}

impl KnockSignal {
    pub fn new(
        sample_rate_hz: f32,
        knock_hz: f32,
        knock_amplitude: f32,
    ) -> Self {
        Self {
            sample_rate_hz,
            knock_hz,
            knock_amplitude,
            background_phase: 0.0,
            knock_phase: 0.0,
            samples_due: 0.0,
        }
    }

    fn next_sample(
        &mut self,
        knocking: bool,
    ) -> u16 {
        let mut value = DC_BIAS + BACKGROUND_AMPLITUDE * F32Ext::sin(self.background_phase);
        if knocking {
            value += self.knock_amplitude * F32Ext::sin(self.knock_phase);
        }
        // Phase accumulators keep precision over long runs
        self.background_phase = (self.background_phase + TAU * BACKGROUND_HZ / self.sample_rate_hz) % TAU;
        self.knock_phase = (self.knock_phase + TAU * self.knock_hz / self.sample_rate_hz) % TAU;
        value.clamp(0.0, ADC_MAX) as u16
    }

    /// Append the samples converted during one millisecond.
    ///
    /// Fractional samples carry over, so any rate is reproduced on average.
    pub fn advance_ms(
        &mut self,
        knocking: bool,
        out: &mut Vec<u16>,
    ) {
        self.samples_due += self.sample_rate_hz / 1000.0;
        while self.samples_due >= 1.0 {
            let sample = self.next_sample(knocking);
            out.push(sample);
            self.samples_due -= 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_preserved() {
        let mut signal = KnockSignal::new(40_000.0, 6_700.0, 0.0);
        let mut out = Vec::new();
        for _ in 0..10 {
            signal.advance_ms(false, &mut out);
        }
        assert_eq!(out.len(), 400, "40 samples per ms");
    }

    #[test]
    fn test_fractional_rate_carries_over() {
        let mut signal = KnockSignal::new(2_500.0, 600.0, 0.0);
        let mut out = Vec::new();
        for _ in 0..4 {
            signal.advance_ms(false, &mut out);
        }
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_samples_stay_in_adc_range() {
        let mut signal = KnockSignal::new(40_000.0, 6_700.0, 10_000.0);
        let mut out = Vec::new();
        signal.advance_ms(true, &mut out);
        assert!(out.iter().all(|&s| s <= 4095));
        assert!(out.contains(&0), "Overdriven knock clips at the rails");
    }
}
