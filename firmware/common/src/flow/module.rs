//! Subsystem identifiers and their static configuration records.

use crate::config::watchdog::{
    ADC_TIMEOUT_MS,
    ANALOG_TIMEOUT_MS,
    BUTTON_TIMEOUT_MS,
    CALIBRATION_TIMEOUT_MS,
    CAN_RX_TIMEOUT_MS,
    CAN_TX_TIMEOUT_MS,
    EGT_TIMEOUT_MS,
    FLASH_TIMEOUT_MS,
    IGNITION_TIMEOUT_MS,
    KNOCK_TIMEOUT_MS,
    WHEEL_SPEED_TIMEOUT_MS,
};

/// Logical subsystems tracked by the module registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ModuleId {
    /// Shared ADC peripheral and its DMA stream.
    Adc = 0,
    /// Analog sensor channel 1 (oil pressure).
    AnalogIn1 = 1,
    /// Analog sensor channel 2 (fuel pressure).
    AnalogIn2 = 2,
    /// Analog sensor channel 3 (manifold pressure).
    AnalogIn3 = 3,
    /// Analog sensor channel 4 (ambient temperature).
    AnalogIn4 = 4,
    /// Knock detection and retard regression.
    Knock = 5,
    /// Ignition feedback frequency (engine RPM).
    Ignition = 6,
    /// Wheel speed input capture.
    WheelSpeed = 7,
    /// Exhaust gas temperature, bank 1.
    Egt1 = 8,
    /// Exhaust gas temperature, bank 2.
    Egt2 = 9,
    /// CAN telemetry transmission.
    CanTx = 10,
    /// CAN reception.
    CanRx = 11,
    /// Left dashboard button and its LED.
    ButtonLeft = 12,
    /// Right dashboard button and its LED.
    ButtonRight = 13,
    /// Flash sector holding the calibration blob.
    Flash = 14,
    /// Calibration loader.
    Calibration = 15,
}

/// Static per-module configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Maximum time between watchdog touches while WORKING.
    pub timeout_ms: Option<u32>,
    /// Modules that use this one; it cannot stop while any of them is WORKING.
    pub dependents: &'static [ModuleId],
}

const ADC_DEPENDENTS: &[ModuleId] = &[
    ModuleId::AnalogIn1,
    ModuleId::AnalogIn2,
    ModuleId::AnalogIn3,
    ModuleId::AnalogIn4,
    ModuleId::Knock,
];

const FLASH_DEPENDENTS: &[ModuleId] = &[ModuleId::Calibration];

impl ModuleId {
    /// Number of modules in the registry.
    pub const COUNT: usize = 16;

    /// Every module, in registry order.
    pub const ALL: [ModuleId; Self::COUNT] = [
        Self::Adc,
        Self::AnalogIn1,
        Self::AnalogIn2,
        Self::AnalogIn3,
        Self::AnalogIn4,
        Self::Knock,
        Self::Ignition,
        Self::WheelSpeed,
        Self::Egt1,
        Self::Egt2,
        Self::CanTx,
        Self::CanRx,
        Self::ButtonLeft,
        Self::ButtonRight,
        Self::Flash,
        Self::Calibration,
    ];

    /// Registry slot of this module.
    #[inline]
    pub const fn index(self) -> usize { self as usize }

    /// Short name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Adc => "ADC",
            Self::AnalogIn1 => "AIN1",
            Self::AnalogIn2 => "AIN2",
            Self::AnalogIn3 => "AIN3",
            Self::AnalogIn4 => "AIN4",
            Self::Knock => "KNOCK",
            Self::Ignition => "IGN",
            Self::WheelSpeed => "WHEEL",
            Self::Egt1 => "EGT1",
            Self::Egt2 => "EGT2",
            Self::CanTx => "CAN_TX",
            Self::CanRx => "CAN_RX",
            Self::ButtonLeft => "BTN_L",
            Self::ButtonRight => "BTN_R",
            Self::Flash => "FLASH",
            Self::Calibration => "CALIB",
        }
    }

    /// Static configuration record of this module.
    pub const fn config(self) -> ModuleConfig {
        match self {
            Self::Adc => ModuleConfig {
                timeout_ms: ADC_TIMEOUT_MS,
                dependents: ADC_DEPENDENTS,
            },
            Self::AnalogIn1 | Self::AnalogIn2 | Self::AnalogIn3 | Self::AnalogIn4 => ModuleConfig {
                timeout_ms: ANALOG_TIMEOUT_MS,
                dependents: &[],
            },
            Self::Knock => ModuleConfig {
                timeout_ms: KNOCK_TIMEOUT_MS,
                dependents: &[],
            },
            Self::Ignition => ModuleConfig {
                timeout_ms: IGNITION_TIMEOUT_MS,
                dependents: &[],
            },
            Self::WheelSpeed => ModuleConfig {
                timeout_ms: WHEEL_SPEED_TIMEOUT_MS,
                dependents: &[],
            },
            Self::Egt1 | Self::Egt2 => ModuleConfig {
                timeout_ms: EGT_TIMEOUT_MS,
                dependents: &[],
            },
            Self::CanTx => ModuleConfig {
                timeout_ms: CAN_TX_TIMEOUT_MS,
                dependents: &[],
            },
            Self::CanRx => ModuleConfig {
                timeout_ms: CAN_RX_TIMEOUT_MS,
                dependents: &[],
            },
            Self::ButtonLeft | Self::ButtonRight => ModuleConfig {
                timeout_ms: BUTTON_TIMEOUT_MS,
                dependents: &[],
            },
            Self::Flash => ModuleConfig {
                timeout_ms: FLASH_TIMEOUT_MS,
                dependents: FLASH_DEPENDENTS,
            },
            Self::Calibration => ModuleConfig {
                timeout_ms: CALIBRATION_TIMEOUT_MS,
                dependents: &[],
            },
        }
    }

    /// Modules that must not be WORKING when this one stops.
    #[inline]
    pub const fn dependents(self) -> &'static [ModuleId] { self.config().dependents }
}
