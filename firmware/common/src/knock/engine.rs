//! Knock engine lifecycle.
//!
//! Thin wrapper tying the spectral pipeline, detector and regression to the
//! module registry. Every entry point consults [`FlowControl`] before doing
//! any work and records its transitions there.
//!
//! # Main loop contract
//!
//! ```ignore
//! engine.poll_handoff(&flow, &KNOCK_SAMPLES);
//! engine.update_periodic(&mut flow, ignition_rpm(), now);
//! can_frame[RETARD_BYTE] = engine.get_retard_percent();
//! ```

use super::detector::KnockDetector;
use super::handoff::SampleHandoff;
use super::regression::RetardRegression;
use super::spectrum::{SpectrumAccumulator, knock_bin_index};
use crate::config::{ConfigError, FFT_LEN, KnockConfig};
use crate::flow::{FlowControl, ModuleId};
use crate::time::Ticks;
use crate::{log_debug, log_error, log_info};

/// Timer that triggers knock ADC conversions.
///
/// The seam to the ADC/DMA driver: the engine reads the conversion rate
/// once per start and switches the trigger on and off.
pub trait SamplingTimer {
    /// Conversion rate in Hz.
    fn sampling_frequency_hz(&self) -> f32;

    /// Start triggering conversions.
    fn enable(&mut self);

    /// Stop triggering conversions. No half-buffer interrupt fires afterwards.
    fn disable(&mut self);
}

const ID: ModuleId = ModuleId::Knock;

/// Knock detection and adaptive ignition retard.
pub struct KnockEngine {
    config: KnockConfig,
    sample_rate_hz: f32,
    spectrum: SpectrumAccumulator,
    detector: KnockDetector,
    regression: RetardRegression,
}

impl KnockEngine {
    /// Build the engine from a calibration record.
    ///
    /// The knock frequency is checked against the sampling timer in `start`.
    pub fn new(
        config: &KnockConfig,
        ticks_per_ms: u32,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            config: config.clone(),
            sample_rate_hz: 0.0,
            spectrum: SpectrumAccumulator::new(1),
            detector: KnockDetector::new(config, ticks_per_ms)?,
            regression: RetardRegression::new(
                config.retard_step_percent,
                config.decay_percent_per_sec,
                ticks_per_ms,
            ),
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize on first use, derive the knock bin, enable sampling.
    ///
    /// Returns true when the module is WORKING afterwards.
    pub fn start(
        &mut self,
        flow: &mut FlowControl,
        timer: &mut impl SamplingTimer,
        now: Ticks,
    ) -> bool {
        if flow.check_working(ID) {
            return flow.is_working(ID);
        }
        if flow.check_double_error(ID) {
            log_debug!("KNOCK: disabled");
            return false;
        }
        if !flow.check_initialized(ID) && !flow.do_initialize(ID) {
            return false;
        }

        let sample_rate_hz = timer.sampling_frequency_hz();
        if let Err(err) = self.config.validate_for_sample_rate(sample_rate_hz) {
            log_error!("KNOCK: {}", err);
            flow.flag_error(ID);
            return false;
        }

        let bin = knock_bin_index(sample_rate_hz, self.config.knock_frequency_hz, FFT_LEN);
        self.sample_rate_hz = sample_rate_hz;
        self.spectrum.reset(bin);
        self.detector.reset();
        self.regression.reset(now);

        if !flow.do_working(ID, now) {
            return false;
        }
        timer.enable();
        log_info!("KNOCK: started, bin {}", bin);
        true
    }

    /// Disable sampling, then leave WORKING and clear the pipeline.
    ///
    /// The hardware trigger goes off before any software state is cleared.
    pub fn stop(
        &mut self,
        flow: &mut FlowControl,
        timer: &mut impl SamplingTimer,
    ) -> bool {
        if !flow.can_stop(ID) {
            return false;
        }
        timer.disable();
        let stopped = flow.do_stop(ID);

        let bin = self.spectrum.bin();
        self.spectrum.reset(bin);
        self.detector.reset();
        self.regression.reset(0);
        log_info!("KNOCK: stopped");
        stopped
    }

    // =========================================================================
    // Sample Path
    // =========================================================================

    /// Feed one half buffer. Ignored unless the module is working.
    ///
    /// Returns true when a transform completed.
    pub fn on_samples(
        &mut self,
        flow: &FlowControl,
        samples: &[u16],
    ) -> bool {
        if !flow.is_working(ID) {
            return false;
        }
        self.spectrum.on_samples(samples)
    }

    /// Take a pending half buffer from the interrupt handoff and feed it.
    ///
    /// The handoff is drained even when the module is not working, so no
    /// stale half is processed after a restart.
    pub fn poll_handoff<const N: usize>(
        &mut self,
        flow: &FlowControl,
        handoff: &SampleHandoff<N>,
    ) -> bool {
        let mut half = [0u16; N];
        let Some(len) = handoff.take(&mut half) else {
            return false;
        };
        self.on_samples(flow, &half[..len])
    }

    // =========================================================================
    // Periodic
    // =========================================================================

    /// One main-loop tick: evaluate a fresh magnitude, run the regression.
    ///
    /// Calling this outside WORKING is a runtime error. While an error is
    /// pending (or after a double error) the tick is skipped without
    /// recording anything; the watchdog sweep grades the pending error.
    /// Without a working ignition module the engine speed is taken as 0
    /// (idle), so nothing is evaluated and the retard only decays.
    pub fn update_periodic(
        &mut self,
        flow: &mut FlowControl,
        rpm: f32,
        now: Ticks,
    ) -> bool {
        if !flow.check_working(ID) {
            flow.flag_error(ID);
            return false;
        }
        if !flow.is_working(ID) {
            return false;
        }
        flow.update_watchdog(ID, now);

        let rpm = if flow.is_working(ModuleId::Ignition) { rpm } else { 0.0 };
        if let Some(magnitude) = self.spectrum.take_magnitude()
            && self.detector.evaluate(magnitude, rpm, now)
        {
            log_debug!("KNOCK: level {}", self.detector.pending_level());
        }

        let level = self.detector.consume_elapsed(now);
        self.regression.update(level, now);
        true
    }

    // =========================================================================
    // Outputs and Diagnostics
    // =========================================================================

    /// Current ignition retard for the CAN frame composer, truncated.
    #[inline]
    pub fn get_retard_percent(&self) -> u8 { self.regression.retard_percent_u8() }

    #[inline]
    pub const fn retard_percent_f32(&self) -> f32 { self.regression.retard_percent() }

    #[inline]
    pub const fn transforms(&self) -> u32 { self.spectrum.transforms() }

    #[inline]
    pub const fn last_magnitude(&self) -> f32 { self.spectrum.last_magnitude() }

    #[inline]
    pub const fn detections(&self) -> u32 { self.detector.detections() }

    #[inline]
    pub const fn is_level_pending(&self) -> bool { self.detector.is_level_pending() }

    #[inline]
    pub const fn pending_level(&self) -> u8 { self.detector.pending_level() }

    /// Bin selected at the last start.
    #[inline]
    pub const fn knock_bin(&self) -> usize { self.spectrum.bin() }

    /// Calibration the engine was built with.
    #[inline]
    pub const fn config(&self) -> &KnockConfig { &self.config }

    /// Sampling rate read at the last start, 0 before the first.
    #[inline]
    pub const fn sample_rate_hz(&self) -> f32 { self.sample_rate_hz }

    /// Interpolated thresholds at `rpm`, `None` at idle.
    #[inline]
    pub fn thresholds_at(
        &self,
        rpm: f32,
    ) -> Option<(f32, f32)> {
        self.detector.thresholds_at(rpm)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
