//! Time base shared by the control loops and watchdogs.
//!
//! - `tick`: rollover-safe delta measurement on the hardware tick counter
//! - `deadline`: non-blocking one-shot delay

mod deadline;
mod tick;

pub use deadline::Deadline;
pub use tick::{TickTracker, Ticks};
