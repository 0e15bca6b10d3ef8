//! ECU peripheral board firmware for STM32F407 (knock detection).
//!
//! # Architecture
//!
//! - ADC task: ADC1 converts the knock sensor continuously into a DMA ring
//!   buffer; every completed half is published to `KNOCK_SAMPLES` while the
//!   knock engine has sampling enabled.
//! - Ignition task: measures the period between ignition pulses on an EXTI
//!   line and publishes the engine speed, or 0 when the pulses stop.
//! - Main loop (1 ms ticker): drains the sample handoff, runs the knock
//!   periodic update, sweeps the module watchdogs and composes the knock CAN
//!   frame. Nothing in the loop blocks.

#![no_std]
#![no_main]
// Crate-level lints (match lib.rs for consistency)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use defmt::{error, info, trace, warn};
use ecu_common::config::{ADC_HALF_BUFFER_LEN, KnockConfig};
use ecu_common::flow::{FlowControl, ModuleId, Severity};
use ecu_common::knock::{KnockEngine, SampleHandoff};
use ecu_common::log_buffer;
use ecu_common::time::Deadline;
use ecu_common::{log_error, log_info, log_warn};
use ecu_stm32::cpu_cycles::{self, LoadMonitor};
use ecu_stm32::ignition::{EngineSpeed, ProgressWatch, STALL_TIMEOUT_MS, rpm_from_period};
use ecu_stm32::sampling::{TriggerGate, adc_sample_rate_hz};
use ecu_stm32::telemetry::KnockFrameComposer;
use embassy_executor::Spawner;
use embassy_stm32::adc::{Adc, RingBufferedAdc, SampleTime, Sequence};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Pull;
use embassy_stm32::peripherals::ADC1;
use embassy_stm32::time::Hertz;
use embassy_stm32::Config;
use embassy_time::{Duration, Instant, Ticker, with_timeout};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

// =============================================================================
// Timing
// =============================================================================

/// embassy-time runs at 1 MHz (`tick-hz-1_000_000`).
const TICKS_PER_MS: u32 = 1_000;

const LOOP_PERIOD_MS: u64 = 1;

/// Registry watchdog sweep.
const SWEEP_PERIOD_MS: u32 = 10;

/// Knock telemetry frame period.
const CAN_FRAME_PERIOD_MS: u32 = 20;

/// Loop load report.
const REPORT_PERIOD_MS: u32 = 1_000;

/// ADC clock: PCLK2 (84 MHz) / 4.
const ADC_CLOCK_HZ: u32 = 21_000_000;

/// Sampling time of the knock channel in ADC clock cycles (`SampleTime::CYCLES480`).
const KNOCK_SAMPLE_CYCLES: u32 = 480;

// =============================================================================
// Shared State
// =============================================================================

/// Half buffers from the ADC task to the main loop.
static KNOCK_SAMPLES: SampleHandoff<ADC_HALF_BUFFER_LEN> = SampleHandoff::new();

/// Set by the knock engine through `TriggerGate`, checked by the ADC task.
static SAMPLING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Completed ADC halves (wraps). Advancing means the ADC is alive.
static ADC_HALVES: AtomicU32 = AtomicU32::new(0);

/// Latest engine speed from the ignition capture.
static ENGINE_SPEED: EngineSpeed = EngineSpeed::new();

/// DMA ring for ADC1: two halves.
static ADC_DMA_BUF: StaticCell<[u16; ADC_HALF_BUFFER_LEN * 2]> = StaticCell::new();

// =============================================================================
// Tasks
// =============================================================================

/// Knock sensor sampling - publishes every completed DMA half.
#[embassy_executor::task]
async fn knock_adc_task(mut adc: RingBufferedAdc<'static, ADC1>) {
    info!("Knock ADC task started");

    let mut half = [0u16; ADC_HALF_BUFFER_LEN];
    if adc.start().is_err() {
        log_error!("Knock ADC failed to start");
    }

    loop {
        match adc.read(&mut half).await {
            Ok(_) => {
                ADC_HALVES.fetch_add(1, Ordering::Release);
                // A refused publish raises the handoff overflow flag
                if SAMPLING_ENABLED.load(Ordering::Acquire) {
                    KNOCK_SAMPLES.publish(&half);
                }
            }
            Err(_) => {
                warn!("Knock ADC overrun, restarting DMA");
                if adc.start().is_err() {
                    log_error!("Knock ADC failed to restart");
                }
            }
        }
    }
}

/// Ignition feedback - engine speed from the pulse period, 0 once pulses stop.
#[embassy_executor::task]
async fn ignition_capture_task(
    mut input: ExtiInput<'static>,
    pulses_per_revolution: u32,
) {
    info!("Ignition capture task started");

    let mut previous: Option<Instant> = None;
    loop {
        let stall = Duration::from_millis(STALL_TIMEOUT_MS);
        if with_timeout(stall, input.wait_for_rising_edge()).await.is_err() {
            ENGINE_SPEED.mark_stopped();
            previous = None;
            continue;
        }

        let now = Instant::now();
        if let Some(previous) = previous {
            let period_us = now.duration_since(previous).as_micros().min(u64::from(u32::MAX)) as u32;
            ENGINE_SPEED.store_rpm(rpm_from_period(period_us, 1_000_000, pulses_per_revolution));
        }
        previous = Some(now);
    }
}

// =============================================================================
// Main
// =============================================================================

fn board_config() -> Config {
    use embassy_stm32::rcc::*;

    // 8 MHz HSE -> 168 MHz SYSCLK, 42 MHz APB1, 84 MHz APB2
    let mut config = Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(8_000_000),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL168,
        divp: Some(PllPDiv::DIV2),
        divq: Some(PllQDiv::DIV7),
        divr: None,
    });
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV4;
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    config.rcc.sys = Sysclk::PLL1_P;
    config
}

/// Bring up a module that has no lifecycle routine of its own.
fn start_module(
    flow: &mut FlowControl,
    id: ModuleId,
    now: u32,
) {
    flow.do_initialize(id);
    if !flow.do_working(id, now) {
        log_error!("{} failed to start", id.name());
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut p = embassy_stm32::init(board_config());
    info!("ECU peripheral board starting...");

    cpu_cycles::init(cpu_cycles::DEFAULT_CPU_FREQ_HZ);
    info!("DWT cycle counter initialized at {} MHz", cpu_cycles::freq_hz() / 1_000_000);

    let config = KnockConfig::default();
    let sample_rate_hz = adc_sample_rate_hz(ADC_CLOCK_HZ, KNOCK_SAMPLE_CYCLES);
    let mut flow = FlowControl::new(TICKS_PER_MS);
    let mut gate = TriggerGate::new(&SAMPLING_ENABLED, sample_rate_hz);
    let mut engine = match KnockEngine::new(&config, TICKS_PER_MS) {
        Ok(engine) => engine,
        Err(e) => defmt::panic!("Knock calibration rejected: {}", e),
    };

    // Knock sensor on PA0, free-running ADC1 with DMA2 stream 0
    let dma_buf = ADC_DMA_BUF.init([0u16; ADC_HALF_BUFFER_LEN * 2]);
    let mut adc: RingBufferedAdc<'static, ADC1> = Adc::new(p.ADC1).into_ring_buffered(p.DMA2_CH0, dma_buf);
    adc.set_sample_sequence(Sequence::One, &mut p.PA0, SampleTime::CYCLES480);
    spawner.spawn(knock_adc_task(adc)).unwrap();

    // Ignition feedback on PA1
    let ignition = ExtiInput::new(p.PA1, p.EXTI1, Pull::Down);
    spawner.spawn(ignition_capture_task(ignition, config.pulses_per_revolution)).unwrap();

    let boot = Instant::now();
    let now = Instant::now().as_ticks() as u32;
    start_module(&mut flow, ModuleId::Adc, now);
    start_module(&mut flow, ModuleId::Ignition, now);
    start_module(&mut flow, ModuleId::CanTx, now);
    if engine.start(&mut flow, &mut gate, now) {
        log_info!("Knock bin {} at {} Hz", engine.knock_bin() as u32, sample_rate_hz as u32);
    } else {
        log_error!("Knock engine failed to start");
    }

    let mut sweep = Deadline::new();
    let mut can_frame = Deadline::new();
    let mut report = Deadline::new();
    sweep.arm(now, SWEEP_PERIOD_MS * TICKS_PER_MS);
    can_frame.arm(now, CAN_FRAME_PERIOD_MS * TICKS_PER_MS);
    report.arm(now, REPORT_PERIOD_MS * TICKS_PER_MS);

    let mut composer = KnockFrameComposer::new();
    let mut load = LoadMonitor::new();
    let mut severity = Severity::Ok;
    let mut adc_progress = ProgressWatch::new(ADC_HALVES.load(Ordering::Acquire));
    let mut ignition_progress = ProgressWatch::new(ENGINE_SPEED.captures());
    let mut ticker = Ticker::every(Duration::from_millis(LOOP_PERIOD_MS));

    log_info!("Main loop starting");

    loop {
        let pass_start = cpu_cycles::read();
        let now = Instant::now().as_ticks() as u32;
        log_buffer::set_timestamp_ms(boot.elapsed().as_millis() as u32);

        // Producers only advance counters; the registry is touched here
        if adc_progress.advanced(ADC_HALVES.load(Ordering::Acquire)) {
            flow.update_watchdog(ModuleId::Adc, now);
        }
        // Also advances with 0 rpm reports while the engine is stopped
        if ignition_progress.advanced(ENGINE_SPEED.captures()) {
            flow.update_watchdog(ModuleId::Ignition, now);
        }

        engine.poll_handoff(&flow, &KNOCK_SAMPLES);
        if flow.is_working(ModuleId::Knock) {
            engine.update_periodic(&mut flow, ENGINE_SPEED.rpm(), now);
        }

        if KNOCK_SAMPLES.is_overflowed() {
            log_warn!("Knock samples overflowed ({} dropped)", KNOCK_SAMPLES.dropped());
            KNOCK_SAMPLES.clear_overflow();
        }

        if sweep.is_done(now) {
            sweep.arm(now, SWEEP_PERIOD_MS * TICKS_PER_MS);
            severity = flow.check_all_watchdogs(now);
            if severity == Severity::Persistent {
                error!("Watchdog sweep: persistent fault");
            }
        }

        if can_frame.is_done(now) {
            can_frame.arm(now, CAN_FRAME_PERIOD_MS * TICKS_PER_MS);
            let frame = composer.compose(&engine, &flow, severity, ENGINE_SPEED.rpm());
            trace!("CAN knock frame: {:02x}", frame);
            flow.update_watchdog(ModuleId::CanTx, now);
        }

        load.record(cpu_cycles::elapsed(pass_start, cpu_cycles::read()), (LOOP_PERIOD_MS * 1_000) as u32);
        if report.is_done(now) {
            report.arm(now, REPORT_PERIOD_MS * TICKS_PER_MS);
            let (peak, passes) = load.take();
            info!(
                "Loop: {} passes, peak load {}%, retard {}%, knock 0x{:02x}",
                passes,
                peak,
                engine.get_retard_percent(),
                flow.status(ModuleId::Knock).bits()
            );
        }

        ticker.next().await;
    }
}
