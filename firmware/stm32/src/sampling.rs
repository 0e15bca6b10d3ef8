//! Knock sensor sampling gate.
//!
//! The ADC converts continuously into a DMA ring buffer; the knock engine
//! switches delivery on and off through [`TriggerGate`], which the ADC task
//! checks before publishing a half buffer.

use core::sync::atomic::{AtomicBool, Ordering};

use ecu_common::SamplingTimer;

/// STM32F4 ADC conversion overhead on top of the sampling time (12-bit).
pub const CONVERSION_CYCLES: u32 = 12;

/// Continuous conversion rate for one channel.
pub fn adc_sample_rate_hz(
    adc_clock_hz: u32,
    sample_cycles: u32,
) -> f32 {
    adc_clock_hz as f32 / (sample_cycles + CONVERSION_CYCLES) as f32
}

/// Enable flag shared between the knock engine and the ADC task.
pub struct TriggerGate {
    enabled: &'static AtomicBool,
    frequency_hz: f32,
}

impl TriggerGate {
    pub const fn new(
        enabled: &'static AtomicBool,
        frequency_hz: f32,
    ) -> Self {
        Self { enabled, frequency_hz }
    }

    pub fn is_enabled(&self) -> bool { self.enabled.load(Ordering::Acquire) }
}

impl SamplingTimer for TriggerGate {
    fn sampling_frequency_hz(&self) -> f32 { self.frequency_hz }

    fn enable(&mut self) { self.enabled.store(true, Ordering::Release); }

    fn disable(&mut self) { self.enabled.store(false, Ordering::Release); }
}
