//! Sample accumulation and spectral magnitude at the knock frequency.
//!
//! Raw 16-bit ADC codes are cast to `f32` without scaling; thresholds are
//! calibrated against the raw magnitude. Once `FFT_LEN` samples are
//! collected, a real FFT runs in place and the magnitude of the knock bin
//! becomes the single reading for that window.

use crate::config::{FFT_BINS, FFT_LEN};

/// Bin of an `fft_len`-point transform closest to `knock_hz`.
///
/// Clamped to `1..=fft_len / 2 - 1`, so neither the DC bin nor the packed
/// Nyquist bin is selected.
pub fn knock_bin_index(
    sample_rate_hz: f32,
    knock_hz: f32,
    fft_len: usize,
) -> usize {
    let highest = (fft_len / 2).saturating_sub(1).max(1);
    let raw = libm::roundf(knock_hz * fft_len as f32 / sample_rate_hz);
    // NaN and negative values saturate to 0
    (raw as usize).clamp(1, highest)
}

/// Center frequency of `bin` in Hz.
#[inline]
pub fn bin_frequency_hz(
    bin: usize,
    sample_rate_hz: f32,
    fft_len: usize,
) -> f32 {
    bin as f32 * sample_rate_hz / fft_len as f32
}

/// Fills the transform window and extracts the knock-bin magnitude.
pub struct SpectrumAccumulator {
    buffer: [f32; FFT_LEN],
    fill_index: usize,
    bin: usize,
    magnitude: Option<f32>,
    last_magnitude: f32,
    transforms: u32,
}

impl SpectrumAccumulator {
    /// Empty window reading magnitude at `bin`.
    pub const fn new(bin: usize) -> Self {
        Self {
            buffer: [0.0; FFT_LEN],
            fill_index: 0,
            bin: clamp_bin(bin),
            magnitude: None,
            last_magnitude: 0.0,
            transforms: 0,
        }
    }

    /// Discard the partial window and any unread magnitude, select a new bin.
    pub fn reset(
        &mut self,
        bin: usize,
    ) {
        self.fill_index = 0;
        self.bin = clamp_bin(bin);
        self.magnitude = None;
    }

    /// Append samples to the window.
    ///
    /// Samples past the end of a full window start the next one, so none are
    /// lost. Returns true if at least one transform completed.
    pub fn on_samples(
        &mut self,
        samples: &[u16],
    ) -> bool {
        let mut completed = false;
        for &sample in samples {
            self.buffer[self.fill_index] = f32::from(sample);
            self.fill_index += 1;
            if self.fill_index == FFT_LEN {
                self.transform();
                self.fill_index = 0;
                completed = true;
            }
        }
        completed
    }

    fn transform(&mut self) {
        // In place: the window buffer holds the packed spectrum afterwards
        let spectrum = microfft::real::rfft_2048(&mut self.buffer);
        let value = spectrum[self.bin];
        let magnitude = libm::sqrtf(value.re * value.re + value.im * value.im);
        self.magnitude = Some(magnitude);
        self.last_magnitude = magnitude;
        self.transforms = self.transforms.wrapping_add(1);
    }

    /// Unread magnitude of the latest window.
    #[inline]
    pub fn take_magnitude(&mut self) -> Option<f32> { self.magnitude.take() }

    /// Most recent magnitude, read or not.
    #[inline]
    pub const fn last_magnitude(&self) -> f32 { self.last_magnitude }

    #[inline]
    pub const fn fill_index(&self) -> usize { self.fill_index }

    #[inline]
    pub const fn bin(&self) -> usize { self.bin }

    /// Windows transformed since boot.
    #[inline]
    pub const fn transforms(&self) -> u32 { self.transforms }
}

const fn clamp_bin(bin: usize) -> usize {
    if bin == 0 {
        1
    } else if bin >= FFT_BINS {
        FFT_BINS - 1
    } else {
        bin
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ADC_HALF_BUFFER_LEN;

    const FS: f32 = 40_000.0;

    fn tone(
        bin: usize,
        amplitude: f32,
    ) -> [u16; FFT_LEN] {
        core::array::from_fn(|n| {
            let phase = 2.0 * core::f32::consts::PI * bin as f32 * n as f32 / FFT_LEN as f32;
            (2048.0 + amplitude * libm::sinf(phase)) as u16
        })
    }

    #[test]
    fn test_bin_index_rounds() {
        // 6700 * 2048 / 40000 = 343.04
        assert_eq!(knock_bin_index(FS, 6_700.0, FFT_LEN), 343);
        assert!((bin_frequency_hz(343, FS, FFT_LEN) - 6_699.2).abs() < 0.1);
    }

    #[test]
    fn test_bin_index_clamped() {
        assert_eq!(knock_bin_index(FS, 0.0, FFT_LEN), 1, "DC bin never selected");
        assert_eq!(knock_bin_index(FS, 30_000.0, FFT_LEN), FFT_BINS - 1);
        assert_eq!(knock_bin_index(0.0, 6_700.0, FFT_LEN), FFT_BINS - 1, "Infinite ratio saturates");
    }

    #[test]
    fn test_fill_index_advances_per_half() {
        let mut acc = SpectrumAccumulator::new(343);
        assert!(!acc.on_samples(&[0; ADC_HALF_BUFFER_LEN]));
        assert_eq!(acc.fill_index(), ADC_HALF_BUFFER_LEN);
        assert!(acc.take_magnitude().is_none());
    }

    #[test]
    fn test_transform_after_full_window() {
        let mut acc = SpectrumAccumulator::new(100);
        let signal = tone(100, 1_000.0);
        let mut completed = 0;
        for half in signal.chunks(ADC_HALF_BUFFER_LEN) {
            if acc.on_samples(half) {
                completed += 1;
            }
        }
        assert_eq!(completed, 1, "Four halves make one window");
        assert_eq!(acc.fill_index(), 0);
        assert_eq!(acc.transforms(), 1);

        // A full-scale bin of a real tone has magnitude amplitude * N / 2
        let magnitude = acc.take_magnitude().unwrap();
        let expected = 1_000.0 * FFT_LEN as f32 / 2.0;
        assert!((magnitude - expected).abs() / expected < 0.02, "Magnitude {magnitude}");
        assert!(acc.take_magnitude().is_none(), "Reading is consumed once");
    }

    #[test]
    fn test_off_bin_tone_is_small() {
        let mut acc = SpectrumAccumulator::new(343);
        acc.on_samples(&tone(100, 1_000.0));
        let magnitude = acc.take_magnitude().unwrap();
        assert!(magnitude < 1_000.0, "Tone at bin 100 leaks into bin 343: {magnitude}");
    }

    #[test]
    fn test_overlapping_call_keeps_remainder() {
        let mut acc = SpectrumAccumulator::new(10);
        acc.on_samples(&[0; FFT_LEN - 100]);
        assert!(acc.on_samples(&[0; 300]));
        assert_eq!(acc.fill_index(), 200, "Samples past the window start the next one");
    }

    #[test]
    fn test_reset_discards_partial_window() {
        let mut acc = SpectrumAccumulator::new(10);
        acc.on_samples(&[5; 700]);
        acc.reset(0);
        assert_eq!(acc.fill_index(), 0);
        assert_eq!(acc.bin(), 1);
    }
}
