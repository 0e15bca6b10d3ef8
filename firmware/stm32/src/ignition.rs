//! Engine speed shared between the ignition input capture and the main loop.
//!
//! The capture task stores the latest RPM as `f32` bits in an atomic,
//! the main loop reads it once per pass. No pulse within
//! [`STALL_TIMEOUT_MS`] is a stopped engine, not a fault: the capture task
//! publishes 0 RPM, which also keeps the ignition watchdog alive while the
//! key is on and the engine is not turning.

use core::sync::atomic::{AtomicU32, Ordering};

use ecu_common::config::watchdog::IGNITION_TIMEOUT_MS;

/// Pulse gap after which the engine counts as stopped (60 rpm at 2 pulses/rev).
pub const STALL_TIMEOUT_MS: u64 = 500;

const _: () = assert!(
    matches!(IGNITION_TIMEOUT_MS, Some(timeout) if STALL_TIMEOUT_MS < timeout as u64),
    "Stall reports must touch the ignition watchdog in time"
);

/// Latest engine speed, written by the ignition capture, read by the knock routine.
pub struct EngineSpeed {
    bits: AtomicU32,
    captures: AtomicU32,
}

impl EngineSpeed {
    /// `0.0f32` has an all-zero bit pattern.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            captures: AtomicU32::new(0),
        }
    }

    /// Publish a new reading. Negative and non-finite values read back as 0.
    pub fn store_rpm(
        &self,
        rpm: f32,
    ) {
        let rpm = if rpm.is_finite() && rpm > 0.0 { rpm } else { 0.0 };
        self.bits.store(rpm.to_bits(), Ordering::Relaxed);
        self.captures.fetch_add(1, Ordering::Release);
    }

    /// Publish "engine stopped".
    #[inline]
    pub fn mark_stopped(&self) { self.store_rpm(0.0); }

    pub fn rpm(&self) -> f32 { f32::from_bits(self.bits.load(Ordering::Relaxed)) }

    /// Number of readings published so far (wraps). The main loop touches the
    /// ignition watchdog whenever it advances.
    pub fn captures(&self) -> u32 { self.captures.load(Ordering::Acquire) }
}

impl Default for EngineSpeed {
    fn default() -> Self { Self::new() }
}

/// Engine speed from the capture period between two ignition pulses.
///
/// Returns 0 for a zero period or a zero pulse count (engine stopped).
pub fn rpm_from_period(
    period_ticks: u32,
    timer_hz: u32,
    pulses_per_revolution: u32,
) -> f32 {
    if period_ticks == 0 || pulses_per_revolution == 0 {
        return 0.0;
    }
    let pulses_per_minute = 60.0 * timer_hz as f32 / period_ticks as f32;
    pulses_per_minute / pulses_per_revolution as f32
}

/// Detects that a producer's wrapping event counter moved since the last look.
#[derive(Debug, Clone, Copy)]
pub struct ProgressWatch {
    seen: u32,
}

impl ProgressWatch {
    pub const fn new(initial: u32) -> Self { Self { seen: initial } }

    pub fn advanced(
        &mut self,
        count: u32,
    ) -> bool {
        let moved = count != self.seen;
        self.seen = count;
        moved
    }
}
