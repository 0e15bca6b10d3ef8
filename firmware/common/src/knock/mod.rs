//! Knock detection pipeline.
//!
//! ```text
//! DMA half buffer -> SampleHandoff -> SpectrumAccumulator (2048-pt real FFT)
//!     -> magnitude at knock bin -> KnockDetector (RPM thresholds)
//!     -> pending level -> RetardRegression -> retard % (CAN)
//! ```
//!
//! [`KnockEngine`] owns the pipeline and gates it through the module registry.

mod detector;
mod engine;
mod handoff;
mod regression;
mod spectrum;
mod threshold;

pub use detector::KnockDetector;
pub use engine::{KnockEngine, SamplingTimer};
pub use handoff::SampleHandoff;
pub use regression::RetardRegression;
pub use spectrum::{SpectrumAccumulator, bin_frequency_hz, knock_bin_index};
pub use threshold::{ThresholdPoint, ThresholdTable, interpolate};
