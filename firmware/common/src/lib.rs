//! Knock detection and module flow control for the ECU peripheral board.
//!
//! This crate contains platform-agnostic code shared between the simulator
//! and the STM32 firmware:
//!
//! - [`time`]: Tick tracking with rollover handling, non-blocking deadlines
//! - [`flow`]: Module registry, lifecycle transitions, watchdogs
//! - [`knock`]: Spectral knock detection and ignition retard regression
//! - [`config`]: Compile-time constants and the runtime knock calibration
//! - [`log_buffer`]: Debug message queue with dual-output logging macros
//!
//! # no_std Compatibility
//!
//! This crate is `no_std` compatible and can be used on embedded targets.
//! It owns no time driver: callers pass the hardware tick counter in, and
//! the main loop publishes the log clock.

#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod flow;
pub mod knock;
pub mod log_buffer;
pub mod time;

// Host critical-section implementation for the embassy-sync mutexes under test
#[cfg(test)]
use critical_section as _;

// Re-export commonly used items
pub use flow::{FlowControl, ModuleId};
pub use knock::{KnockEngine, SampleHandoff, SamplingTimer};
pub use time::Ticks;
