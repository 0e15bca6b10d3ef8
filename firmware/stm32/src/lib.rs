//! Board support for the ECU peripheral firmware - modules testable on the host.
//!
//! The binary (`main.rs`) wires these to the embassy-stm32 peripherals.
//!
//! # Testing
//!
//! Run tests on host with:
//! ```bash
//! cargo test --manifest-path firmware/stm32/Cargo.toml --lib --target x86_64-unknown-linux-gnu
//! ```

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod cpu_cycles;
pub mod ignition;
pub mod sampling;
pub mod telemetry;

#[cfg(test)]
use critical_section as _;
