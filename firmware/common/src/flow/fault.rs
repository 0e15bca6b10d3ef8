//! Fault taxonomy of the module registry.

/// Classification of a recorded error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// Single failed precondition, recoverable by a subsequent successful start.
    Transient,
    /// Second error without an intervening successful WORKING transition.
    /// The caller must stop retrying the module.
    Persistent,
    /// Error flagged on a module that was never initialized: a sequencing
    /// bug in the caller. The module status is left untouched.
    Programming,
    /// Periodic routine missed its watchdog deadline (escalates like a transient error).
    WatchdogTimeout,
}

impl FaultKind {
    /// Whether the error was recorded in the module status.
    #[inline]
    pub const fn is_recorded(self) -> bool { !matches!(self, Self::Programming) }
}

/// Coded result of a watchdog sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Severity {
    /// No new errors.
    #[default]
    Ok = 0,
    /// A new error on a module without a previous acknowledged error.
    Transient = 1,
    /// A new error on a module whose previous error was already acknowledged.
    Persistent = 2,
}

impl Severity {
    /// Numeric code as reported on the diagnostics channel.
    #[inline]
    pub const fn code(self) -> u8 { self as u8 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_codes() {
        assert_eq!(Severity::Ok.code(), 0);
        assert_eq!(Severity::Transient.code(), 1);
        assert_eq!(Severity::Persistent.code(), 2);
        assert!(Severity::Persistent > Severity::Transient, "Sweep reports the worst severity");
    }

    #[test]
    fn test_programming_error_not_recorded() {
        assert!(!FaultKind::Programming.is_recorded());
        assert!(FaultKind::WatchdogTimeout.is_recorded());
    }
}
