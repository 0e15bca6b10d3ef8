//! Main loop load measurement using the Cortex-M4 DWT cycle counter.
//!
//! CYCCNT is a 32-bit counter; at 168 MHz it wraps every ~25.6 seconds.
//! Loop passes are well under a millisecond, so `wrapping_sub` is enough.

use core::sync::atomic::{AtomicU32, Ordering};

/// Core clock after `embassy_stm32::init` with the board PLL settings.
pub const DEFAULT_CPU_FREQ_HZ: u32 = 168_000_000;

static CPU_FREQ_HZ: AtomicU32 = AtomicU32::new(DEFAULT_CPU_FREQ_HZ);

/// Anything above ~1 s of cycles is a wrap or a missed measurement.
const MAX_SANE_CYCLES: u32 = 200_000_000;

/// Enable the DWT cycle counter. Idempotent.
pub fn init(freq_hz: u32) {
    // F4 parts run between 16 MHz (HSI) and 180 MHz
    CPU_FREQ_HZ.store(freq_hz.clamp(16_000_000, 180_000_000), Ordering::Relaxed);

    #[cfg(target_arch = "arm")]
    unsafe {
        use core::ptr::{read_volatile, write_volatile};

        // DEMCR.TRCENA (bit 24) first, then DWT.CTRL.CYCCNTENA (bit 0)
        const DEMCR: *mut u32 = 0xE000_EDFC as *mut u32;
        write_volatile(DEMCR, read_volatile(DEMCR) | (1 << 24));

        const DWT_CTRL: *mut u32 = 0xE000_1000 as *mut u32;
        write_volatile(DWT_CTRL, read_volatile(DWT_CTRL) | 1);
    }
}

/// Current cycle count (wraps).
#[inline]
pub fn read() -> u32 {
    #[cfg(target_arch = "arm")]
    unsafe {
        const DWT_CYCCNT: *const u32 = 0xE000_1004 as *const u32;
        core::ptr::read_volatile(DWT_CYCCNT)
    }
    #[cfg(not(target_arch = "arm"))]
    {
        0
    }
}

/// Elapsed cycles with wrap handling; 0 when the span is implausible.
#[inline]
pub fn elapsed(
    start: u32,
    end: u32,
) -> u32 {
    let elapsed = end.wrapping_sub(start);
    if elapsed > MAX_SANE_CYCLES { 0 } else { elapsed }
}

#[inline]
pub fn freq_hz() -> u32 { CPU_FREQ_HZ.load(Ordering::Relaxed) }

/// Busy share of a loop period in percent (0-100).
///
/// `cycles_used` is the work done in one pass, `period_us` the pass budget.
pub fn load_percent(
    cycles_used: u32,
    period_us: u32,
) -> u32 {
    if period_us == 0 || cycles_used == 0 {
        return 0;
    }

    let budget = (u64::from(freq_hz()) * u64::from(period_us)) / 1_000_000;
    if budget == 0 {
        return 0;
    }

    // Can exceed 100 when interrupts land inside the measured span
    ((u64::from(cycles_used) * 100) / budget).min(100) as u32
}

/// Tracks the peak loop load between two reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadMonitor {
    peak_percent: u32,
    passes: u32,
}

impl LoadMonitor {
    pub const fn new() -> Self {
        Self {
            peak_percent: 0,
            passes: 0,
        }
    }

    pub fn record(
        &mut self,
        cycles_used: u32,
        period_us: u32,
    ) {
        self.peak_percent = self.peak_percent.max(load_percent(cycles_used, period_us));
        self.passes = self.passes.saturating_add(1);
    }

    /// Returns `(peak_percent, passes)` and starts a new reporting window.
    pub fn take(&mut self) -> (u32, u32) {
        let report = (self.peak_percent, self.passes);
        *self = Self::new();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_across_wrap() {
        assert_eq!(elapsed(10, 110), 100);
        assert_eq!(elapsed(u32::MAX - 9, 10), 20, "Counter wrapped");
        assert_eq!(elapsed(0, MAX_SANE_CYCLES + 1), 0, "Implausible span");
    }

    #[test]
    fn test_load_percent() {
        init(DEFAULT_CPU_FREQ_HZ);
        // 1 ms at 168 MHz = 168000 cycles
        assert_eq!(load_percent(42_000, 1_000), 25);
        assert_eq!(load_percent(500_000, 1_000), 100, "Clamped");
        assert_eq!(load_percent(0, 1_000), 0);
        assert_eq!(load_percent(1_000, 0), 0);
    }

    #[test]
    fn test_load_monitor_window() {
        init(DEFAULT_CPU_FREQ_HZ);
        let mut monitor = LoadMonitor::new();
        monitor.record(16_800, 1_000);
        monitor.record(84_000, 1_000);
        monitor.record(33_600, 1_000);

        assert_eq!(monitor.take(), (50, 3));
        assert_eq!(monitor.take(), (0, 0), "Window restarts after a report");
    }
}
