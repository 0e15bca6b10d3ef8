//! End-to-end tests for the knock pipeline
//!
//! Sample handoff -> FFT window -> threshold evaluation -> retard regression,
//! driven through the registry the way the firmware main loop does.

use core::f32::consts::PI;

use critical_section as _;
use ecu_common::config::{ADC_HALF_BUFFER_LEN, FFT_LEN, KnockConfig};
use ecu_common::flow::{FaultKind, FlowControl, ModuleId, Severity};
use ecu_common::knock::{
    KnockDetector,
    KnockEngine,
    RetardRegression,
    SampleHandoff,
    SamplingTimer,
    SpectrumAccumulator,
    ThresholdPoint,
    ThresholdTable,
    interpolate,
};
use proptest::prelude::*;

const FS: f32 = 40_000.0;
const KNOCK_BIN: f32 = 343.0;

struct Timer {
    enabled: bool,
}

impl SamplingTimer for Timer {
    fn sampling_frequency_hz(&self) -> f32 { FS }

    fn enable(&mut self) { self.enabled = true; }

    fn disable(&mut self) { self.enabled = false; }
}

fn knock_signal(amplitude: f32) -> Vec<u16> {
    (0..FFT_LEN)
        .map(|n| {
            let phase = 2.0 * PI * KNOCK_BIN * n as f32 / FFT_LEN as f32;
            (2048.0 + amplitude * phase.sin()) as u16
        })
        .collect()
}

fn running_engine() -> (FlowControl, KnockEngine, Timer) {
    let mut flow = FlowControl::new(1);
    flow.do_initialize(ModuleId::Ignition);
    flow.do_working(ModuleId::Ignition, 0);

    let mut timer = Timer { enabled: false };
    let mut engine = KnockEngine::new(&KnockConfig::default(), 1).unwrap();
    assert!(engine.start(&mut flow, &mut timer, 0));
    (flow, engine, timer)
}

#[test]
fn test_interpolation_exactness() {
    let y = interpolate(1_200.0, 1_000.0, 1.0, 2_000.0, 2.0);
    assert!((y - 1.2).abs() < 1e-6, "Expected 1.2, got {y}");
}

#[test]
fn test_knock_raises_then_decays_retard() {
    let (mut flow, mut engine, _timer) = running_engine();
    let handoff = SampleHandoff::<ADC_HALF_BUFFER_LEN>::new();

    for half in knock_signal(150.0).chunks(ADC_HALF_BUFFER_LEN) {
        assert!(handoff.publish(half));
        engine.poll_handoff(&flow, &handoff);
    }
    assert_eq!(engine.transforms(), 1);

    // 3000 rpm: min 60000, max 180000; magnitude ~153600 grades as level 4
    assert!(engine.update_periodic(&mut flow, 3_000.0, 1));
    assert!(engine.is_level_pending());
    assert_eq!(engine.pending_level(), 4);
    assert_eq!(engine.get_retard_percent(), 0, "Applied only after the window");

    // 120000 / 3000 = 40 ms window
    engine.update_periodic(&mut flow, 3_000.0, 20);
    assert!(engine.is_level_pending());
    engine.update_periodic(&mut flow, 3_000.0, 41);
    assert!(!engine.is_level_pending());
    assert_eq!(engine.get_retard_percent(), 8, "Level 4 at 2 % per level");

    // Decay 5 %/s for one second, touching the watchdog every 50 ms
    let mut now = 41;
    for _ in 0..20 {
        now += 50;
        flow.update_watchdog(ModuleId::Ignition, now);
        assert!(engine.update_periodic(&mut flow, 3_000.0, now));
    }
    assert!((engine.retard_percent_f32() - 3.0).abs() < 1e-3, "Got {}", engine.retard_percent_f32());
    assert!(flow.is_working(ModuleId::Knock), "No watchdog timeout while ticking");
}

#[test]
fn test_watchdog_lapse_is_transient_and_recovers() {
    let (mut flow, mut engine, mut timer) = running_engine();
    assert!(engine.update_periodic(&mut flow, 3_000.0, 1));

    // Main loop stalls for 150 ms; the late tick raises the knock timeout
    assert!(engine.update_periodic(&mut flow, 3_000.0, 151));
    assert_eq!(flow.status(ModuleId::Knock).last_fault(), Some(FaultKind::WatchdogTimeout));
    assert!(!engine.update_periodic(&mut flow, 3_000.0, 152), "Tick skipped while the error is pending");

    // Sweep acknowledges the timeout, the engine runs on
    assert_eq!(flow.check_all_watchdogs(155), Severity::Transient);
    assert!(flow.is_working(ModuleId::Knock));
    for now in (160..=600).step_by(10) {
        flow.update_watchdog(ModuleId::Ignition, now);
        assert!(engine.update_periodic(&mut flow, 3_000.0, now));
        assert_eq!(flow.check_all_watchdogs(now), Severity::Ok);
    }
    assert!(!flow.check_double_error(ModuleId::Knock), "A single lapse never disables knock");

    // Restart clears the acknowledgement
    assert!(engine.stop(&mut flow, &mut timer));
    assert!(engine.start(&mut flow, &mut timer, 700));
    assert!(!flow.status(ModuleId::Knock).is_error_acknowledged());
}

#[test]
fn test_quiet_engine_keeps_zero_retard() {
    let (mut flow, mut engine, _timer) = running_engine();
    engine.on_samples(&flow, &knock_signal(5.0));
    assert!(engine.update_periodic(&mut flow, 3_000.0, 1));
    assert!(!engine.is_level_pending());
    assert_eq!(engine.detections(), 0);
    assert_eq!(engine.get_retard_percent(), 0);
}

#[test]
fn test_stop_clears_pipeline_and_output() {
    let (mut flow, mut engine, mut timer) = running_engine();
    engine.on_samples(&flow, &knock_signal(150.0));
    engine.update_periodic(&mut flow, 3_000.0, 1);
    assert!(engine.is_level_pending());

    assert!(engine.stop(&mut flow, &mut timer));
    assert!(!timer.enabled);
    assert!(!engine.is_level_pending());
    assert_eq!(engine.get_retard_percent(), 0);

    assert!(engine.start(&mut flow, &mut timer, 100), "Restart after stop");
    assert!(timer.enabled);
}

#[test]
fn test_fft_window_boundary_exact() {
    let signal = knock_signal(100.0);

    let mut whole = SpectrumAccumulator::new(343);
    assert!(whole.on_samples(&signal));

    // Same samples in uneven pieces
    let mut pieces = SpectrumAccumulator::new(343);
    let mut transforms = 0;
    for chunk in signal.chunks(300) {
        if pieces.on_samples(chunk) {
            transforms += 1;
        }
    }
    assert_eq!(transforms, 1);
    assert_eq!(pieces.fill_index(), 0);
    assert_eq!(
        pieces.take_magnitude(),
        whole.take_magnitude(),
        "No samples lost or duplicated across calls"
    );
}

#[test]
fn test_single_pending_detection_per_window() {
    let mut detector = KnockDetector::new(&KnockConfig::default(), 1).unwrap();
    assert!(detector.evaluate(150_000.0, 3_000.0, 0));
    let level = detector.pending_level();

    assert!(!detector.evaluate(1e9, 3_000.0, 5));
    assert!(detector.is_level_pending());
    assert_eq!(detector.pending_level(), level, "Severity unchanged");
}

proptest! {
    /// Property: lookups outside the table return the outer breakpoint values
    #[test]
    fn threshold_clamps_outside_range(
        first_x in 100.0f32..1_000.0,
        span in 100.0f32..5_000.0,
        below in 0.0f32..1.0,
        above in 1.01f32..1_000.0,
    ) {
        let first = ThresholdPoint::new(first_x, 10.0, 20.0);
        let last = ThresholdPoint::new(first_x + span, 30.0, 60.0);
        let table = ThresholdTable::new(&[first, last]).unwrap();

        prop_assert_eq!(table.lookup(first_x * below), (first.min, first.max));
        prop_assert_eq!(table.lookup((first_x + span) * above), (last.min, last.max));
    }

    /// Property: from 50 %, one second of decay at R %/s yields max(0, 50 - R)
    #[test]
    fn retard_decays_linearly(rate in 0.0f32..120.0) {
        let mut regression = RetardRegression::new(10.0, rate, 1);
        prop_assert_eq!(regression.update(Some(5), 0), 50.0);

        let value = regression.update(None, 1_000);
        let expected = (50.0 - rate).max(0.0);
        prop_assert!((value - expected).abs() < 1e-3, "rate {} -> {} expected {}", rate, value, expected);
    }

    /// Property: interpolation stays within its breakpoint values
    #[test]
    fn interpolation_is_bounded(
        x0 in 0.0f32..1_000.0,
        span in 1.0f32..1_000.0,
        t in 0.0f32..=1.0,
        y0 in 0.0f32..1e6,
        y1 in 0.0f32..1e6,
    ) {
        let y = interpolate(x0 + t * span, x0, y0, x0 + span, y1);
        let (lo, hi) = if y0 < y1 { (y0, y1) } else { (y1, y0) };
        prop_assert!(y >= lo - 1.0 && y <= hi + 1.0);
    }
}
