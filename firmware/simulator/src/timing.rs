//! Timing constants for the simulator.
//!
//! The simulation runs on a virtual millisecond clock. These constants use
//! `std::time::Duration` where they pace real time, so they live here rather
//! than in the common crate.

use std::time::Duration;

/// Simulated hardware tick rate (1 kHz counter).
pub const TICKS_PER_MS: u32 = 1;

/// Main loop period in simulated milliseconds.
pub const LOOP_PERIOD_MS: u32 = 1;

/// Interval between registry watchdog sweeps.
pub const SWEEP_PERIOD_MS: u32 = 10;

/// Wall-clock time per simulated loop with `--realtime`.
pub const REALTIME_STEP: Duration = Duration::from_millis(LOOP_PERIOD_MS as u64);
