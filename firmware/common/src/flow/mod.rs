//! Module lifecycle and flow control.
//!
//! - [`ModuleId`]: fixed enumeration of subsystems with their [`ModuleConfig`]
//! - [`FlowControl`]: registry of lifecycle states, errors and watchdogs
//! - [`FaultKind`] / [`Severity`]: error classification and sweep result

mod fault;
mod module;
mod registry;
mod status;

pub use fault::{FaultKind, Severity};
pub use module::{ModuleConfig, ModuleId};
pub use registry::FlowControl;
pub use status::{
    Lifecycle,
    ModuleStatus,
    STATUS_DOUBLE_ERROR,
    STATUS_ERROR,
    STATUS_ERROR_ACK,
    STATUS_INIT,
    STATUS_STOP,
    STATUS_WORKING,
};
