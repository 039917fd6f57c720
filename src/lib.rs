//! # rateconv
//!
//! Streaming sample-rate conversion for audio, built around a cascade of
//! FFT-convolution, polyphase and half-band stages.
//!
//! The conversion ratio is factored into a chain of cheap specialized
//! stages: powers of two are stripped into tabulated half-band decimators,
//! a DFT stage handles fixed integer interpolation or decimation by block
//! convolution, and a variable-ratio polyphase stage absorbs the remaining
//! (possibly irrational) factor on a drift-free clock. Filters are designed
//! at start-up from a quality target (bit-accuracy, bandwidth, phase
//! response) and shared read-only across channels.
//!
//! ## Quick start
//!
//! One-shot conversion of a mono buffer:
//!
//! ```
//! use rateconv::{convert, ConvertParams, QualityPreset};
//!
//! let input: Vec<f64> = (0..44100)
//!     .map(|i| (i as f64 * 440.0 / 44100.0 * std::f64::consts::TAU).sin())
//!     .collect();
//! let params = ConvertParams::new(44100.0, 48000.0)
//!     .unwrap()
//!     .with_preset(QualityPreset::Medium);
//! let output = convert(&input, &params).unwrap();
//! assert_eq!(output.len(), 48000);
//! ```
//!
//! For streaming and multi-channel use, see [`Resampler`]; for per-channel
//! control, [`CascadePlan`] and [`RateConverter`].

#![forbid(unsafe_code)]

pub mod error;
pub mod fft;
pub mod fifo;
pub mod filter;
pub mod params;
pub mod rate;
pub mod stream;

pub use error::RateError;
pub use fft::FftContext;
pub use fifo::SampleFifo;
pub use params::{ConvertParams, QualityPreset, Rolloff};
pub use rate::{CascadePlan, RateConverter};
pub use stream::Resampler;

/// Converts a complete interleaved buffer in one call.
///
/// Equivalent to feeding everything to a [`Resampler`] and flushing; the
/// output length per channel is exactly `round(input_frames / factor)`.
///
/// # Errors
/// Fails on invalid parameters, unrealizable filter designs, misaligned
/// frames, or non-finite samples.
pub fn convert(input: &[f64], params: &ConvertParams) -> Result<Vec<f64>, RateError> {
    let mut resampler = Resampler::new(params)?;
    let mut out = resampler.process(input)?;
    out.extend(resampler.flush());
    Ok(out)
}

/// Interleaves per-channel buffers into frames.
///
/// All channels must be the same length; the result is
/// `channels[0].len()` frames wide.
pub fn interleave(channels: &[Vec<f64>]) -> Vec<f64> {
    let n = channels.len();
    let frames = channels.first().map_or(0, |c| c.len());
    debug_assert!(channels.iter().all(|c| c.len() == frames));
    let mut out = vec![0.0; frames * n];
    for (c, channel) in channels.iter().enumerate() {
        for (f, &s) in channel.iter().enumerate() {
            out[f * n + c] = s;
        }
    }
    out
}

/// Splits interleaved frames into per-channel buffers.
pub fn deinterleave(interleaved: &[f64], num_channels: usize) -> Vec<Vec<f64>> {
    let frames = interleaved.len() / num_channels.max(1);
    (0..num_channels)
        .map(|c| (0..frames).map(|f| interleaved[f * num_channels + c]).collect())
        .collect()
}
