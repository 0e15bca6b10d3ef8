//! Knock diagnostics frame for the CAN composer.
//!
//! Layout (8 bytes, little endian):
//!
//! | Byte | Content                                   |
//! |------|-------------------------------------------|
//! | 0    | retard percent (0-100)                    |
//! | 1    | knock module status bits                  |
//! | 2    | worst watchdog severity of the last sweep |
//! | 3    | pending knock level (0 = none)            |
//! | 4-5  | engine speed, rpm                         |
//! | 6    | programming error count (saturating)      |
//! | 7    | rolling counter                           |

use ecu_common::flow::{FlowControl, ModuleId, Severity};
use ecu_common::KnockEngine;

pub const FRAME_LEN: usize = 8;

/// Composes the periodic knock frame.
#[derive(Debug, Default)]
pub struct KnockFrameComposer {
    counter: u8,
}

impl KnockFrameComposer {
    pub const fn new() -> Self { Self { counter: 0 } }

    pub fn compose(
        &mut self,
        engine: &KnockEngine,
        flow: &FlowControl,
        severity: Severity,
        rpm: f32,
    ) -> [u8; FRAME_LEN] {
        let rpm = rpm.clamp(0.0, f32::from(u16::MAX)) as u16;
        let level = if engine.is_level_pending() { engine.pending_level() } else { 0 };
        let [rpm_lo, rpm_hi] = rpm.to_le_bytes();

        let frame = [
            engine.get_retard_percent(),
            flow.status(ModuleId::Knock).bits(),
            severity.code(),
            level,
            rpm_lo,
            rpm_hi,
            flow.programming_errors().min(u32::from(u8::MAX)) as u8,
            self.counter,
        ];
        self.counter = self.counter.wrapping_add(1);
        frame
    }
}

#[cfg(test)]
mod tests {
    use ecu_common::config::KnockConfig;

    use super::*;

    #[test]
    fn test_idle_frame() {
        let flow = FlowControl::new(1);
        let engine = KnockEngine::new(&KnockConfig::default(), 1).unwrap();
        let mut composer = KnockFrameComposer::new();

        let frame = composer.compose(&engine, &flow, Severity::Ok, 3_000.0);
        assert_eq!(frame[0], 0, "No retard");
        assert_eq!(frame[1], 0x01, "Knock module stopped");
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), 3_000);
        assert_eq!(frame[7], 0);
    }

    #[test]
    fn test_counter_rolls_and_rpm_clamps() {
        let flow = FlowControl::new(1);
        let engine = KnockEngine::new(&KnockConfig::default(), 1).unwrap();
        let mut composer = KnockFrameComposer::new();

        for _ in 0..256 {
            composer.compose(&engine, &flow, Severity::Ok, 0.0);
        }
        let frame = composer.compose(&engine, &flow, Severity::Persistent, 1e9);
        assert_eq!(frame[7], 0, "Counter wrapped after 256 frames");
        assert_eq!(frame[2], 2);
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), u16::MAX);
    }
}
