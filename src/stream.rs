//! Streaming multi-channel resampler over interleaved frames.
//!
//! One [`CascadePlan`] is built per conversion and shared by every channel:
//! the designed filter coefficients and the FFT table cache are read-only
//! and live behind `Arc`, while each channel runs its own stateful
//! [`RateConverter`].

use std::sync::Arc;

use crate::error::RateError;
use crate::fft::FftContext;
use crate::params::ConvertParams;
use crate::rate::{CascadePlan, RateConverter};

/// Streaming sample-rate converter for interleaved multi-channel audio.
///
/// ```
/// use rateconv::{ConvertParams, QualityPreset, Resampler};
///
/// let params = ConvertParams::new(44100.0, 48000.0)
///     .unwrap()
///     .with_channels(2)
///     .with_preset(QualityPreset::Medium);
/// let mut resampler = Resampler::new(&params).unwrap();
///
/// let block = vec![0.0f64; 2 * 441];
/// let out = resampler.process(&block).unwrap();
/// let tail = resampler.flush();
/// assert_eq!(out.len() % 2, 0);
/// assert_eq!(tail.len() % 2, 0);
/// ```
#[derive(Debug)]
pub struct Resampler {
    plan: CascadePlan,
    channels: Vec<RateConverter>,
    scratch: Vec<f64>,
}

impl Resampler {
    /// Creates a resampler with its own FFT context.
    ///
    /// # Errors
    /// Fails on invalid parameters or unrealizable filter designs.
    pub fn new(params: &ConvertParams) -> Result<Self, RateError> {
        Self::with_context(params, Arc::new(FftContext::new()))
    }

    /// Creates a resampler sharing an existing FFT context, so several
    /// concurrent conversions reuse one planned-transform cache.
    pub fn with_context(
        params: &ConvertParams,
        ctx: Arc<FftContext>,
    ) -> Result<Self, RateError> {
        let plan = CascadePlan::new(params, ctx)?;
        let channels = (0..params.channels)
            .map(|_| RateConverter::new(&plan))
            .collect();
        Ok(Self {
            plan,
            channels,
            scratch: Vec::new(),
        })
    }

    /// Number of interleaved channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Input rate divided by output rate.
    pub fn factor(&self) -> f64 {
        self.plan.factor()
    }

    /// True when input and output rates are equal and frames pass through
    /// unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.plan.is_passthrough()
    }

    /// Expected output frame count for `input_frames` input frames over the
    /// whole stream (individual blocks may return more or fewer).
    pub fn output_len_hint(&self, input_frames: usize) -> usize {
        (input_frames as f64 / self.plan.factor() + 0.5) as usize
    }

    /// Feeds a block of interleaved frames and returns whatever converted
    /// frames are ready.
    ///
    /// # Errors
    /// Fails if the block is not a whole number of frames or contains
    /// non-finite samples; the converter state is unchanged on error.
    pub fn process(&mut self, interleaved: &[f64]) -> Result<Vec<f64>, RateError> {
        let n = self.channels.len();
        if interleaved.len() % n != 0 {
            return Err(RateError::MisalignedFrames {
                len: interleaved.len(),
                channels: n,
            });
        }
        if interleaved.iter().any(|s| !s.is_finite()) {
            return Err(RateError::NonFiniteInput);
        }
        if self.is_passthrough() {
            return Ok(interleaved.to_vec());
        }

        let frames = interleaved.len() / n;
        for (c, conv) in self.channels.iter_mut().enumerate() {
            self.scratch.clear();
            self.scratch
                .extend((0..frames).map(|f| interleaved[f * n + c]));
            conv.input(&self.scratch);
            conv.process();
        }
        Ok(self.collect_ready())
    }

    /// Flushes all channels and returns the final frames, completing the
    /// stream at exactly `round(total_in / factor)` frames per channel.
    pub fn flush(&mut self) -> Vec<f64> {
        if self.is_passthrough() {
            return Vec::new();
        }
        for conv in &mut self.channels {
            conv.flush();
        }
        self.collect_ready()
    }

    fn collect_ready(&mut self) -> Vec<f64> {
        let n = self.channels.len();
        let frames = self
            .channels
            .iter()
            .map(|c| c.occupancy())
            .min()
            .unwrap_or(0);
        let mut out = vec![0.0f64; frames * n];
        for (c, conv) in self.channels.iter_mut().enumerate() {
            let samples = conv.output(frames);
            for (f, &s) in samples.iter().enumerate() {
                out[f * n + c] = s;
            }
        }
        out
    }
}
