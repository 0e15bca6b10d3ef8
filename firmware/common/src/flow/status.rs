//! Per-module lifecycle state and error overlay.

use super::fault::FaultKind;
use crate::time::{TickTracker, Ticks};

/// Primary lifecycle state of a module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lifecycle {
    /// Not running. Also the state after a successful stop.
    #[default]
    Stopped,
    /// Hardware configured, not yet running.
    Initialized,
    /// Running; periodic routines may execute.
    Working,
}

// =============================================================================
// Legacy Status Mask
// =============================================================================

/// Status bit: module stopped.
pub const STATUS_STOP: u8 = 0x01;
/// Status bit: module initialized at least once.
pub const STATUS_INIT: u8 = 0x02;
/// Status bit: module working.
pub const STATUS_WORKING: u8 = 0x04;
/// Status bit: unacknowledged error pending.
pub const STATUS_ERROR: u8 = 0x08;
/// Status bit: a previous error was acknowledged by the watchdog sweep.
pub const STATUS_ERROR_ACK: u8 = 0x10;
/// Status bit: second error without recovery, module permanently disabled.
pub const STATUS_DOUBLE_ERROR: u8 = 0x20;

/// Registry entry of one module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleStatus {
    pub(super) lifecycle: Lifecycle,
    pub(super) initialized: bool,
    pub(super) error: bool,
    pub(super) error_acknowledged: bool,
    pub(super) double_error: bool,
    pub(super) last_fault: Option<FaultKind>,
    pub(super) last_update: TickTracker,
    pub(super) timeout_ms: Option<u32>,
}

impl ModuleStatus {
    /// Fresh entry: stopped, never initialized, no errors.
    pub const fn new(
        ticks_per_ms: u32,
        timeout_ms: Option<u32>,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::Stopped,
            initialized: false,
            error: false,
            error_acknowledged: false,
            double_error: false,
            last_fault: None,
            last_update: TickTracker::new(ticks_per_ms),
            timeout_ms,
        }
    }

    #[inline]
    pub const fn lifecycle(&self) -> Lifecycle { self.lifecycle }

    /// Whether the module ever completed initialization.
    #[inline]
    pub const fn is_initialized(&self) -> bool { self.initialized }

    /// Unacknowledged error pending.
    #[inline]
    pub const fn has_error(&self) -> bool { self.error }

    #[inline]
    pub const fn is_error_acknowledged(&self) -> bool { self.error_acknowledged }

    /// Permanently disabled.
    #[inline]
    pub const fn has_double_error(&self) -> bool { self.double_error }

    /// Classification of the most recent recorded error.
    #[inline]
    pub const fn last_fault(&self) -> Option<FaultKind> { self.last_fault }

    #[inline]
    pub const fn timeout_ms(&self) -> Option<u32> { self.timeout_ms }

    /// Whether a watchdog timeout would fire at `now`.
    pub const fn is_overdue(
        &self,
        now: Ticks,
    ) -> bool {
        match self.timeout_ms {
            Some(timeout) => self.last_update.elapsed_ms(now) > timeout,
            None => false,
        }
    }

    /// Render as the legacy status bit mask.
    pub const fn bits(&self) -> u8 {
        let mut bits = match self.lifecycle {
            Lifecycle::Stopped => STATUS_STOP,
            Lifecycle::Initialized => 0,
            Lifecycle::Working => STATUS_WORKING,
        };
        if self.initialized {
            bits |= STATUS_INIT;
        }
        if self.error {
            bits |= STATUS_ERROR;
        }
        if self.error_acknowledged {
            bits |= STATUS_ERROR_ACK;
        }
        if self.double_error {
            bits |= STATUS_DOUBLE_ERROR;
        }
        bits
    }
}
