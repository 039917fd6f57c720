//! FIR filters pre-transformed for overlap-discard convolution.

use rustfft::num_complex::Complex;

use crate::fft::FftContext;

/// Chooses the transform length for overlap-discard convolution with a
/// `num_taps`-point filter: 4x the nearest power of two, reduced towards 2x
/// for very long filters to keep the working set cache-friendly.
pub fn set_dft_length(num_taps: usize) -> usize {
    let d = (num_taps as f64).log2();
    let hi = ((d + 1.77) as u32).max(17);
    1usize << ((d + 2.77) as u32).clamp(10, hi)
}

/// A FIR filter held as a frequency-domain spectrum, ready for
/// multiply-per-block convolution.
///
/// The taps are rotated so that the filter's group-delay peak lands at
/// index 0 of the transform block, and pre-scaled by the stage's
/// interpolation factor so that zero-stuffed input comes out at unity
/// gain. Shared read-only between all channels of a conversion.
#[derive(Debug, Clone)]
pub struct DftFilter {
    /// Full complex spectrum of the rotated, scaled taps.
    pub spectrum: Vec<Complex<f64>>,
    /// Original tap count.
    pub num_taps: usize,
    /// Taps after the group-delay peak.
    pub post_peak: usize,
    /// Transform length (power of two).
    pub dft_length: usize,
}

impl DftFilter {
    /// Transforms `taps` for use at interpolation factor `multiplier`.
    pub fn new(ctx: &FftContext, taps: &[f64], post_peak: usize, multiplier: usize) -> Self {
        let num_taps = taps.len();
        let dft_length = set_dft_length(num_taps);
        debug_assert!(num_taps <= dft_length);
        let mut rotated = vec![0.0f64; dft_length];
        for (i, &t) in taps.iter().enumerate() {
            rotated[(i + dft_length - num_taps + 1) & (dft_length - 1)] = t * multiplier as f64;
        }
        let spectrum = ctx.real_spectrum(&rotated, dft_length);
        Self {
            spectrum,
            num_taps,
            post_peak,
            dft_length,
        }
    }

    /// Samples of history carried between successive blocks.
    #[inline]
    pub fn overlap(&self) -> usize {
        self.num_taps - 1
    }
}
