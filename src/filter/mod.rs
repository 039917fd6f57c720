//! FIR filter design and frequency-domain filter preparation.

pub mod design;
pub mod dft;
pub mod phase;

pub use design::{design_lpf, Window};
pub use dft::DftFilter;
pub use phase::fir_to_phase;
