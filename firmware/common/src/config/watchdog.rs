//! Watchdog timeouts per subsystem.
//!
//! A WORKING module whose periodic routine does not touch its watchdog
//! within the timeout is flagged with a runtime error. `None` means the
//! module is event driven and has no liveness requirement.

/// Shared ADC: DMA half-buffer completions arrive every ~13 ms at 40 kHz.
pub const ADC_TIMEOUT_MS: Option<u32> = Some(50);

/// Analog sensor channels are refreshed by the 100 Hz sensor routine.
pub const ANALOG_TIMEOUT_MS: Option<u32> = Some(100);

/// Knock routine runs on every main loop pass.
pub const KNOCK_TIMEOUT_MS: Option<u32> = Some(100);

/// Ignition feedback: input capture stalls below cranking speed, so allow a second.
pub const IGNITION_TIMEOUT_MS: Option<u32> = Some(1_000);

/// Wheel speed capture.
pub const WHEEL_SPEED_TIMEOUT_MS: Option<u32> = Some(500);

/// Thermocouple converters are polled at 4 Hz.
pub const EGT_TIMEOUT_MS: Option<u32> = Some(500);

/// Telemetry frames go out every 20 ms.
pub const CAN_TX_TIMEOUT_MS: Option<u32> = Some(200);

/// Reception depends on other bus nodes, no liveness requirement.
pub const CAN_RX_TIMEOUT_MS: Option<u32> = None;

/// Buttons are event driven.
pub const BUTTON_TIMEOUT_MS: Option<u32> = None;

/// Flash is only touched while programming a calibration blob.
pub const FLASH_TIMEOUT_MS: Option<u32> = None;

/// Calibration loader runs once at start.
pub const CALIBRATION_TIMEOUT_MS: Option<u32> = None;
