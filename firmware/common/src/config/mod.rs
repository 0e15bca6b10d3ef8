//! Board configuration.
//!
//! - `knock`: spectral pipeline constants and the per-engine knock calibration
//! - `watchdog`: watchdog timeouts per subsystem
//! - `error`: calibration validation errors

mod error;
pub mod knock;
pub mod watchdog;

pub use error::ConfigError;
// Re-export knock calibration at config level for convenience
pub use knock::{
    ADC_HALF_BUFFER_LEN,
    FFT_BINS,
    FFT_LEN,
    IDLE_RPM,
    KNOCK_LEVEL_MAX,
    KnockConfig,
    MAX_THRESHOLD_POINTS,
    RETARD_MAX_PERCENT,
    RPM_OFFSET,
    THRESHOLD_TABLE_LEN,
};
