//! Central module registry.
//!
//! Every subsystem's start/stop/periodic entry point consults the registry
//! before touching hardware, and records its transitions here rather than in
//! local flags. All mutation goes through the sanctioned transitions below.
//!
//! # Lifecycle
//!
//! ```text
//! STOP -> INITIALIZED -> WORKING -> STOP -> WORKING -> ...
//! ```
//!
//! ERROR is an overlay on any state. The watchdog sweep acknowledges it; a
//! successful stop clears it. A second error before the next successful
//! WORKING transition is a double error and disables the module for good.
//!
//! # Concurrency
//!
//! The registry is owned by the main loop and passed by reference to each
//! subsystem. It is never touched from interrupt context.

use super::fault::{FaultKind, Severity};
use super::module::ModuleId;
use super::status::{Lifecycle, ModuleStatus};
use crate::time::Ticks;
use crate::{log_debug, log_error, log_warn};

/// Lifecycle and error state of every module.
#[derive(Clone, Debug)]
pub struct FlowControl {
    modules: [ModuleStatus; ModuleId::COUNT],
    programming_errors: u32,
}

impl FlowControl {
    /// Registry with every module stopped and never initialized.
    ///
    /// `ticks_per_ms` is the rate of the counter passed to the watchdog calls.
    pub const fn new(ticks_per_ms: u32) -> Self {
        let mut modules = [ModuleStatus::new(ticks_per_ms, None); ModuleId::COUNT];
        let mut i = 0;
        while i < ModuleId::COUNT {
            modules[i] = ModuleStatus::new(ticks_per_ms, ModuleId::ALL[i].config().timeout_ms);
            i += 1;
        }
        Self {
            modules,
            programming_errors: 0,
        }
    }

    #[inline]
    const fn entry(
        &self,
        id: ModuleId,
    ) -> &ModuleStatus {
        &self.modules[id.index()]
    }

    #[inline]
    fn entry_mut(
        &mut self,
        id: ModuleId,
    ) -> &mut ModuleStatus {
        &mut self.modules[id.index()]
    }

    /// Copy of a module's registry entry.
    #[inline]
    pub const fn status(
        &self,
        id: ModuleId,
    ) -> ModuleStatus {
        self.modules[id.index()]
    }

    /// Errors flagged on modules that were never initialized.
    #[inline]
    pub const fn programming_errors(&self) -> u32 { self.programming_errors }

    // =========================================================================
    // Stop
    // =========================================================================

    #[inline]
    pub const fn check_stopped(
        &self,
        id: ModuleId,
    ) -> bool {
        matches!(self.entry(id).lifecycle, Lifecycle::Stopped)
    }

    /// Whether `do_stop` would succeed: WORKING, and no dependent module WORKING.
    pub fn can_stop(
        &self,
        id: ModuleId,
    ) -> bool {
        let status = self.entry(id);
        status.initialized
            && status.lifecycle == Lifecycle::Working
            && !id.dependents().iter().any(|&dep| self.check_working(dep))
    }

    /// WORKING -> STOP. Clears a pending error, keeps the acknowledgement.
    ///
    /// Returns false without touching the entry when the module is not
    /// WORKING or a dependent is still WORKING.
    pub fn do_stop(
        &mut self,
        id: ModuleId,
    ) -> bool {
        if !self.can_stop(id) {
            log_debug!("{}: stop refused", id.name());
            return false;
        }
        let status = self.entry_mut(id);
        status.lifecycle = Lifecycle::Stopped;
        status.error = false;
        log_debug!("{}: stopped", id.name());
        true
    }

    // =========================================================================
    // Initialize
    // =========================================================================

    /// Whether the module ever completed initialization.
    #[inline]
    pub const fn check_initialized(
        &self,
        id: ModuleId,
    ) -> bool {
        self.entry(id).initialized
    }

    /// STOP -> INITIALIZED, once per module.
    pub fn do_initialize(
        &mut self,
        id: ModuleId,
    ) -> bool {
        let status = self.entry_mut(id);
        if status.lifecycle != Lifecycle::Stopped || status.initialized {
            log_debug!("{}: init refused", id.name());
            return false;
        }
        status.lifecycle = Lifecycle::Initialized;
        status.initialized = true;
        log_debug!("{}: initialized", id.name());
        true
    }

    // =========================================================================
    // Working
    // =========================================================================

    /// Raw WORKING state, regardless of the error overlay.
    #[inline]
    pub const fn check_working(
        &self,
        id: ModuleId,
    ) -> bool {
        matches!(self.entry(id).lifecycle, Lifecycle::Working)
    }

    /// WORKING with no pending error and no double error.
    ///
    /// This is the gate every periodic routine checks before running.
    #[inline]
    pub const fn is_working(
        &self,
        id: ModuleId,
    ) -> bool {
        let status = self.entry(id);
        matches!(status.lifecycle, Lifecycle::Working) && !status.error && !status.double_error
    }

    /// -> WORKING. Requires a completed initialization and no error.
    ///
    /// A successful transition ends the error cycle: the acknowledgement is
    /// cleared and the watchdog restarts from `now`.
    pub fn do_working(
        &mut self,
        id: ModuleId,
        now: Ticks,
    ) -> bool {
        let status = self.entry_mut(id);
        if !status.initialized
            || status.lifecycle == Lifecycle::Working
            || status.error
            || status.double_error
        {
            log_debug!("{}: start refused", id.name());
            return false;
        }
        status.lifecycle = Lifecycle::Working;
        status.error_acknowledged = false;
        status.last_update.reset(now);
        log_debug!("{}: working", id.name());
        true
    }

    // =========================================================================
    // Errors
    // =========================================================================

    /// Unacknowledged error pending.
    #[inline]
    pub const fn check_error(
        &self,
        id: ModuleId,
    ) -> bool {
        self.entry(id).error
    }

    /// Record a runtime error and classify it.
    pub fn do_error(
        &mut self,
        id: ModuleId,
    ) -> FaultKind {
        self.raise(id, FaultKind::Transient)
    }

    /// Record a runtime error. True when it was recorded as a runtime fault,
    /// false for a programming error.
    #[inline]
    pub fn flag_error(
        &mut self,
        id: ModuleId,
    ) -> bool {
        self.do_error(id).is_recorded()
    }

    #[inline]
    pub const fn check_double_error(
        &self,
        id: ModuleId,
    ) -> bool {
        self.entry(id).double_error
    }

    /// Force the double-error state. The caller must stop retrying the module.
    pub fn do_double_error(
        &mut self,
        id: ModuleId,
    ) -> bool {
        if !self.entry(id).initialized {
            self.programming_error(id);
            return false;
        }
        let status = self.entry_mut(id);
        status.error = true;
        status.double_error = true;
        status.last_fault = Some(FaultKind::Persistent);
        log_error!("{}: double error", id.name());
        true
    }

    fn programming_error(
        &mut self,
        id: ModuleId,
    ) {
        self.programming_errors = self.programming_errors.saturating_add(1);
        log_error!("{}: error before init", id.name());
    }

    fn raise(
        &mut self,
        id: ModuleId,
        kind: FaultKind,
    ) -> FaultKind {
        if !self.entry(id).initialized {
            self.programming_error(id);
            return FaultKind::Programming;
        }
        let status = self.entry_mut(id);
        if status.double_error {
            status.error = true;
            return FaultKind::Persistent;
        }
        if status.error || status.error_acknowledged {
            status.error = true;
            status.double_error = true;
            status.last_fault = Some(FaultKind::Persistent);
            log_error!("{}: double error", id.name());
            return FaultKind::Persistent;
        }
        status.error = true;
        status.last_fault = Some(kind);
        if kind == FaultKind::WatchdogTimeout {
            log_error!("{}: watchdog timeout", id.name());
        } else {
            log_warn!("{}: runtime error", id.name());
        }
        kind
    }

    // =========================================================================
    // Watchdogs
    // =========================================================================

    /// Touch the module's watchdog.
    ///
    /// Returns false, and raises a watchdog error, when the time since the
    /// previous touch exceeds the module timeout.
    pub fn update_watchdog(
        &mut self,
        id: ModuleId,
        now: Ticks,
    ) -> bool {
        let status = self.entry_mut(id);
        let overdue = status.is_overdue(now);
        status.last_update.update(now);
        if overdue {
            self.raise(id, FaultKind::WatchdogTimeout);
        }
        !overdue
    }

    /// Sweep the registry and grade new errors.
    ///
    /// First, healthy WORKING modules whose last touch is older than their
    /// timeout are flagged. Then every pending error is consumed: the first
    /// one on a module is acknowledged (transient), one arriving on an
    /// already acknowledged module promotes it to double error (persistent).
    /// A module that reached double error between two sweeps grades as
    /// persistent too.
    /// Returns the worst grade seen.
    pub fn check_all_watchdogs(
        &mut self,
        now: Ticks,
    ) -> Severity {
        let mut worst = Severity::Ok;
        for id in ModuleId::ALL {
            if self.is_working(id) && self.entry(id).is_overdue(now) {
                self.raise(id, FaultKind::WatchdogTimeout);
                // Report a stalled module once per timeout period
                self.entry_mut(id).last_update.reset(now);
            }

            let status = self.entry_mut(id);
            if !status.error {
                continue;
            }
            let severity = if status.double_error || status.error_acknowledged {
                status.double_error = true;
                Severity::Persistent
            } else {
                status.error_acknowledged = true;
                Severity::Transient
            };
            status.error = false;
            worst = worst.max(severity);
        }
        worst
    }
}

impl Default for FlowControl {
    fn default() -> Self { Self::new(1) }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::status::{STATUS_ERROR, STATUS_ERROR_ACK, STATUS_INIT, STATUS_STOP, STATUS_WORKING};

    fn running(id: ModuleId) -> FlowControl {
        let mut flow = FlowControl::new(1);
        assert!(flow.do_initialize(id));
        assert!(flow.do_working(id, 0));
        flow
    }

    #[test]
    fn test_fresh_registry_is_stopped() {
        let flow = FlowControl::new(1);
        for id in ModuleId::ALL {
            assert!(flow.check_stopped(id));
            assert!(!flow.check_initialized(id));
            assert!(!flow.is_working(id));
        }
    }

    #[test]
    fn test_timeouts_loaded_from_module_config() {
        let flow = FlowControl::new(1);
        assert_eq!(flow.status(ModuleId::Knock).timeout_ms(), ModuleId::Knock.config().timeout_ms);
        assert_eq!(flow.status(ModuleId::CanRx).timeout_ms(), None);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut flow = FlowControl::new(1);
        let id = ModuleId::Knock;

        assert!(flow.do_initialize(id));
        assert_eq!(flow.status(id).bits(), STATUS_INIT);
        assert!(flow.do_working(id, 0));
        assert_eq!(flow.status(id).bits(), STATUS_INIT | STATUS_WORKING);
        assert!(flow.do_stop(id));
        assert_eq!(flow.status(id).bits(), STATUS_INIT | STATUS_STOP);
        assert!(flow.do_working(id, 10), "Restart after stop needs no re-init");
        assert!(flow.is_working(id));
    }

    #[test]
    fn test_initialize_only_once() {
        let mut flow = FlowControl::new(1);
        assert!(flow.do_initialize(ModuleId::Flash));
        assert!(!flow.do_initialize(ModuleId::Flash), "Initialized module cannot re-init");
    }

    #[test]
    fn test_working_requires_initialize() {
        let mut flow = FlowControl::new(1);
        assert!(!flow.do_working(ModuleId::Egt1, 0));
        assert!(flow.check_stopped(ModuleId::Egt1));
    }

    #[test]
    fn test_working_twice_refused() {
        let mut flow = running(ModuleId::CanTx);
        assert!(!flow.do_working(ModuleId::CanTx, 5));
    }

    #[test]
    fn test_stop_when_stopped_is_noop() {
        let mut flow = FlowControl::new(1);
        flow.do_initialize(ModuleId::Ignition);
        let before = flow.status(ModuleId::Ignition);
        assert!(!flow.do_stop(ModuleId::Ignition));
        assert_eq!(flow.status(ModuleId::Ignition), before, "Refused stop must not mutate");
    }

    #[test]
    fn test_stop_blocked_by_working_dependent() {
        let mut flow = running(ModuleId::Adc);
        flow.do_initialize(ModuleId::AnalogIn2);
        flow.do_working(ModuleId::AnalogIn2, 0);

        assert!(!flow.can_stop(ModuleId::Adc));
        assert!(!flow.do_stop(ModuleId::Adc), "ADC in use by an analog input");
        assert!(flow.check_working(ModuleId::Adc));

        assert!(flow.do_stop(ModuleId::AnalogIn2));
        assert!(flow.do_stop(ModuleId::Adc));
    }

    #[test]
    fn test_error_before_init_is_programming_error() {
        let mut flow = FlowControl::new(1);
        let before = flow.status(ModuleId::ButtonLeft);

        assert_eq!(flow.do_error(ModuleId::ButtonLeft), FaultKind::Programming);
        assert!(!flow.flag_error(ModuleId::ButtonLeft));
        assert_eq!(flow.status(ModuleId::ButtonLeft), before, "Status untouched");
        assert_eq!(flow.programming_errors(), 2);
    }

    #[test]
    fn test_error_blocks_working() {
        let mut flow = running(ModuleId::Knock);
        assert_eq!(flow.do_error(ModuleId::Knock), FaultKind::Transient);
        assert!(flow.check_working(ModuleId::Knock));
        assert!(!flow.is_working(ModuleId::Knock), "Error overlay gates the module");
    }

    #[test]
    fn test_second_error_is_double_error() {
        let mut flow = running(ModuleId::Knock);
        assert!(flow.flag_error(ModuleId::Knock));
        assert_eq!(flow.do_error(ModuleId::Knock), FaultKind::Persistent);
        assert!(flow.check_double_error(ModuleId::Knock));
    }

    #[test]
    fn test_stop_then_start_recovers_transient_error() {
        let mut flow = running(ModuleId::Knock);
        flow.flag_error(ModuleId::Knock);

        assert!(flow.do_stop(ModuleId::Knock));
        assert!(!flow.check_error(ModuleId::Knock), "Stop clears the pending error");
        assert!(flow.do_working(ModuleId::Knock, 0));
        assert!(flow.is_working(ModuleId::Knock));

        assert_eq!(flow.do_error(ModuleId::Knock), FaultKind::Transient, "Error cycle restarted");
    }

    #[test]
    fn test_double_error_prevents_restart() {
        let mut flow = running(ModuleId::Egt2);
        assert!(flow.do_double_error(ModuleId::Egt2));
        assert!(flow.do_stop(ModuleId::Egt2));
        assert!(!flow.do_working(ModuleId::Egt2, 0));
    }

    #[test]
    fn test_watchdog_touch_within_timeout() {
        let mut flow = running(ModuleId::Knock);
        assert!(flow.update_watchdog(ModuleId::Knock, 50));
        assert!(flow.update_watchdog(ModuleId::Knock, 150));
        assert!(flow.is_working(ModuleId::Knock));
    }

    #[test]
    fn test_watchdog_touch_too_late_raises_error() {
        let mut flow = running(ModuleId::Knock);
        assert!(!flow.update_watchdog(ModuleId::Knock, 101));
        assert_eq!(flow.status(ModuleId::Knock).last_fault(), Some(FaultKind::WatchdogTimeout));
    }

    #[test]
    fn test_watchdog_without_timeout_never_fires() {
        let mut flow = running(ModuleId::CanRx);
        assert!(flow.update_watchdog(ModuleId::CanRx, u32::MAX / 2));
    }

    #[test]
    fn test_sweep_grades_transient_then_persistent() {
        let mut flow = running(ModuleId::Knock);
        assert_eq!(flow.check_all_watchdogs(0), Severity::Ok);

        flow.flag_error(ModuleId::Knock);
        assert_eq!(flow.check_all_watchdogs(0), Severity::Transient);
        assert_eq!(
            flow.status(ModuleId::Knock).bits() & (STATUS_ERROR | STATUS_ERROR_ACK),
            STATUS_ERROR_ACK,
            "Error acknowledged and cleared"
        );
        assert_eq!(flow.check_all_watchdogs(0), Severity::Ok, "Acknowledged error reported once");

        flow.flag_error(ModuleId::Knock);
        assert_eq!(flow.check_all_watchdogs(0), Severity::Persistent);
        assert!(flow.check_double_error(ModuleId::Knock));
    }

    #[test]
    fn test_sweep_grades_double_error_between_sweeps_as_persistent() {
        let mut flow = running(ModuleId::Egt1);
        assert_eq!(flow.do_error(ModuleId::Egt1), FaultKind::Transient);
        assert_eq!(flow.do_error(ModuleId::Egt1), FaultKind::Persistent);

        assert_eq!(flow.check_all_watchdogs(0), Severity::Persistent, "Disabled for good");
        assert!(flow.check_double_error(ModuleId::Egt1));
    }

    #[test]
    fn test_sweep_grades_forced_double_error_as_persistent() {
        let mut flow = running(ModuleId::Egt2);
        assert!(flow.do_double_error(ModuleId::Egt2));
        assert_eq!(flow.check_all_watchdogs(0), Severity::Persistent);
    }

    #[test]
    fn test_sweep_detects_stalled_module() {
        let mut flow = running(ModuleId::CanTx);
        assert_eq!(flow.check_all_watchdogs(200), Severity::Ok);
        assert_eq!(flow.check_all_watchdogs(201), Severity::Transient);
        assert_eq!(flow.status(ModuleId::CanTx).last_fault(), Some(FaultKind::WatchdogTimeout));
    }

    #[test]
    fn test_sweep_ignores_stopped_modules() {
        let mut flow = FlowControl::new(1);
        flow.do_initialize(ModuleId::Knock);
        assert_eq!(flow.check_all_watchdogs(1_000_000), Severity::Ok);
    }

    #[test]
    fn test_watchdog_rollover() {
        let mut flow = FlowControl::new(1);
        flow.do_initialize(ModuleId::Knock);
        assert!(flow.do_working(ModuleId::Knock, u32::MAX - 20));
        assert!(flow.update_watchdog(ModuleId::Knock, 30), "51 ticks across the wrap");
    }
}
