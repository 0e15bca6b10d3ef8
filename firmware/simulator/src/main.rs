//! Knock engine simulator for the desktop.
//!
//! Drives the common crate the way the STM32 firmware does: a synthetic
//! knock-sensor signal is chopped into DMA-sized half buffers and published
//! through a static `SampleHandoff` (the "interrupt"), and a main loop on a
//! virtual millisecond clock polls the handoff, runs the knock periodic
//! update and sweeps the registry watchdogs.
//!
//! # Usage
//!
//! ```text
//! simulator --rpm 3000 --knock-amplitude 150 --knock-from-ms 500 --knock-until-ms 1500
//! ```

// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod profiling;
mod signal;
mod timing;

use std::thread;
use std::time::Instant;

use anyhow as ah;
use clap::Parser;
use critical_section as _;
use ecu_common::config::{ADC_HALF_BUFFER_LEN, KnockConfig};
use ecu_common::flow::{FlowControl, ModuleId, Severity};
use ecu_common::knock::{KnockEngine, SampleHandoff, SamplingTimer, bin_frequency_hz};
use ecu_common::log_buffer::{self, LOG_BUFFER, LogLevel};
use ecu_common::{log_info, log_warn};

use crate::profiling::RunMetrics;
use crate::signal::KnockSignal;
use crate::timing::{LOOP_PERIOD_MS, REALTIME_STEP, SWEEP_PERIOD_MS, TICKS_PER_MS};

/// Half buffers from the simulated DMA interrupt to the main loop.
static KNOCK_SAMPLES: SampleHandoff<ADC_HALF_BUFFER_LEN> = SampleHandoff::new();

#[derive(Parser, Debug)]
#[command(about = "Simulate knock detection and ignition retard")]
struct Opts {
    /// Engine speed
    #[arg(long, default_value_t = 3_000.0)]
    rpm: f32,

    /// Knock tone amplitude in ADC codes
    #[arg(long, default_value_t = 150.0)]
    knock_amplitude: f32,

    /// Start of the knock burst
    #[arg(long, default_value_t = 500)]
    knock_from_ms: u32,

    /// End of the knock burst
    #[arg(long, default_value_t = 1_500)]
    knock_until_ms: u32,

    /// Simulated run time
    #[arg(long, default_value_t = 5_000)]
    duration_ms: u32,

    /// ADC sampling timer frequency in Hz
    #[arg(long, default_value_t = 40_000.0)]
    sample_rate: f32,

    /// Interval between status lines
    #[arg(long, default_value_t = 250)]
    report_every_ms: u32,

    /// Run without an ignition feedback module (engine speed reads as idle)
    #[arg(long)]
    no_ignition: bool,

    /// Pace the loop in real time
    #[arg(long)]
    realtime: bool,

    /// Also print registry transitions (debug level)
    #[arg(short, long)]
    verbose: bool,
}

/// ADC trigger timer of the simulated board.
struct SimTimer {
    hz: f32,
    enabled: bool,
}

impl SamplingTimer for SimTimer {
    fn sampling_frequency_hz(&self) -> f32 { self.hz }

    fn enable(&mut self) { self.enabled = true; }

    fn disable(&mut self) { self.enabled = false; }
}

/// Print and remove everything queued in the debug message buffer.
fn drain_logs() {
    while let Some(entry) = LOG_BUFFER.try_lock().ok().and_then(|mut buffer| buffer.pop_oldest()) {
        println!("[{:>6} ms] {} {}", entry.timestamp_ms, entry.level.prefix(), entry.message);
    }
}

fn main() -> ah::Result<()> {
    let opts = Opts::parse();
    ah::ensure!(opts.rpm.is_finite() && opts.rpm >= 0.0, "--rpm must be a non-negative number");
    ah::ensure!(opts.report_every_ms > 0, "--report-every-ms must be positive");

    log_buffer::set_min_level(if opts.verbose { LogLevel::Debug } else { LogLevel::Info });

    let config = KnockConfig::default();
    config.validate()?;
    config.validate_for_sample_rate(opts.sample_rate)?;

    let mut flow = FlowControl::new(TICKS_PER_MS);
    let mut engine = KnockEngine::new(&config, TICKS_PER_MS)?;
    let mut timer = SimTimer {
        hz: opts.sample_rate,
        enabled: false,
    };
    let mut signal = KnockSignal::new(opts.sample_rate, config.knock_frequency_hz, opts.knock_amplitude);
    let mut metrics = RunMetrics::new();

    if !opts.no_ignition {
        flow.do_initialize(ModuleId::Ignition);
        flow.do_working(ModuleId::Ignition, 0);
    }
    ah::ensure!(engine.start(&mut flow, &mut timer, 0), "knock engine failed to start");
    log_info!(
        "Knock bin {} = {} Hz",
        engine.knock_bin(),
        bin_frequency_hz(engine.knock_bin(), opts.sample_rate, ecu_common::config::FFT_LEN) as u32
    );

    let mut pending: Vec<u16> = Vec::with_capacity(ADC_HALF_BUFFER_LEN * 2);
    let mut now_ms = 0u32;
    while now_ms <= opts.duration_ms {
        let loop_start = Instant::now();
        let now = now_ms * TICKS_PER_MS;
        log_buffer::set_timestamp_ms(now_ms);

        // Interrupt side: conversions of this millisecond, one half buffer at a time
        if timer.enabled {
            let knocking = (opts.knock_from_ms..opts.knock_until_ms).contains(&now_ms);
            signal.advance_ms(knocking, &mut pending);
            while pending.len() >= ADC_HALF_BUFFER_LEN {
                if !KNOCK_SAMPLES.publish(&pending[..ADC_HALF_BUFFER_LEN]) {
                    metrics.overflows += 1;
                }
                pending.drain(..ADC_HALF_BUFFER_LEN);
            }
        }

        // Main loop side
        if !opts.no_ignition {
            flow.update_watchdog(ModuleId::Ignition, now);
        }
        engine.poll_handoff(&flow, &KNOCK_SAMPLES);
        if flow.is_working(ModuleId::Knock) {
            engine.update_periodic(&mut flow, opts.rpm, now);
        }

        let mut severity = Severity::Ok;
        if now_ms % SWEEP_PERIOD_MS == 0 {
            severity = flow.check_all_watchdogs(now);
            if severity != Severity::Ok {
                log_warn!("Watchdog sweep: severity {}", severity.code());
            }
        }
        if KNOCK_SAMPLES.is_overflowed() {
            log_warn!("Knock samples overflowed");
            KNOCK_SAMPLES.clear_overflow();
        }

        metrics.record_outputs(engine.retard_percent_f32(), severity.code());
        if now_ms % opts.report_every_ms == 0 {
            println!(
                "{:>6} ms  rpm {:>5.0}  mag {:>9.0}  level {}  retard {:>5.1} % (CAN {:>3})  knock 0x{:02X}",
                now_ms,
                opts.rpm,
                engine.last_magnitude(),
                engine.pending_level(),
                engine.retard_percent_f32(),
                engine.get_retard_percent(),
                flow.status(ModuleId::Knock).bits(),
            );
        }
        drain_logs();

        metrics.record_loop(loop_start.elapsed());
        if opts.realtime {
            let spent = loop_start.elapsed();
            if spent < REALTIME_STEP {
                thread::sleep(REALTIME_STEP - spent);
            }
        }
        now_ms += LOOP_PERIOD_MS;
    }

    engine.stop(&mut flow, &mut timer);
    drain_logs();

    println!();
    println!("Transforms:      {}", engine.transforms());
    println!("Detections:      {}", engine.detections());
    println!("Peak retard:     {:.1} %", metrics.peak_retard_percent);
    println!("Overflows:       {} ({} dropped)", metrics.overflows, KNOCK_SAMPLES.dropped());
    println!("Worst severity:  {}", metrics.worst_severity);
    println!("Prog. errors:    {}", flow.programming_errors());
    println!(
        "Loop time:       min {} us, avg {} us, max {} us over {} loops in {:?}",
        metrics.loop_time_min_us,
        metrics.loop_time_avg_us(),
        metrics.loop_time_max_us,
        metrics.total_loops,
        metrics.uptime(),
    );
    Ok(())
}
