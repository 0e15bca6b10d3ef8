//! Loop timing and knock statistics for a simulation run.
//!
//! Wall-clock cost of one main-loop pass (sample path, periodic update,
//! watchdog sweep) is measured with `Instant`, the way the firmware measures
//! it with the cycle counter.

use std::time::{Duration, Instant};

/// Loop timing and pipeline counters.
pub struct RunMetrics {
    // Loop timing (microseconds)
    pub loop_time_min_us: u32,
    pub loop_time_max_us: u32,
    loop_time_avg_us: f32,

    // Counters
    pub total_loops: u64,
    pub overflows: u32,
    pub peak_retard_percent: f32,
    pub worst_severity: u8,

    // Uptime tracking
    start_time: Instant,
}

impl RunMetrics {
    const EMA_ALPHA: f32 = 0.1;

    pub fn new() -> Self {
        Self {
            loop_time_min_us: u32::MAX,
            loop_time_max_us: 0,
            loop_time_avg_us: 0.0,
            total_loops: 0,
            overflows: 0,
            peak_retard_percent: 0.0,
            worst_severity: 0,
            start_time: Instant::now(),
        }
    }

    /// Record the wall-clock time of one loop pass.
    pub fn record_loop(
        &mut self,
        loop_time: Duration,
    ) {
        let us = loop_time.as_micros() as u32;
        self.loop_time_min_us = self.loop_time_min_us.min(us);
        self.loop_time_max_us = self.loop_time_max_us.max(us);

        if self.total_loops == 0 {
            self.loop_time_avg_us = us as f32;
        } else {
            self.loop_time_avg_us = Self::EMA_ALPHA.mul_add(us as f32, (1.0 - Self::EMA_ALPHA) * self.loop_time_avg_us);
        }
        self.total_loops += 1;
    }

    /// Track the highest retard and the worst sweep result seen.
    pub fn record_outputs(
        &mut self,
        retard_percent: f32,
        severity_code: u8,
    ) {
        self.peak_retard_percent = self.peak_retard_percent.max(retard_percent);
        self.worst_severity = self.worst_severity.max(severity_code);
    }

    #[inline]
    pub const fn loop_time_avg_us(&self) -> u32 { self.loop_time_avg_us as u32 }

    /// Wall-clock time since the run started.
    #[inline]
    pub fn uptime(&self) -> Duration { self.start_time.elapsed() }
}

impl Default for RunMetrics {
    fn default() -> Self { Self::new() }
}
