//! Error types for the rateconv crate.

use std::fmt;

/// Errors that can occur while configuring or running a rate conversion.
///
/// Conversion itself is a deterministic numeric transform; all errors are
/// detected at setup, except [`RateError::NonFiniteInput`] which guards the
/// one-shot entry points.
#[derive(Debug, Clone, PartialEq)]
pub enum RateError {
    /// Sample rate must be positive and finite.
    InvalidRate(f64),
    /// Channel count must be at least 1.
    InvalidChannels(usize),
    /// A numeric quality override is outside its permitted range.
    InvalidOverride {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Explicit overrides are not allowed with the Quick and Low presets.
    OverrideNotAllowed(&'static str),
    /// Two overrides contradict each other.
    ConflictingOverrides(&'static str),
    /// Filter design was asked for a cutoff at or beyond the Nyquist frequency.
    CutoffAboveNyquist { passband: f64, nyquist: f64 },
    /// Input contains NaN or infinite samples.
    NonFiniteInput,
    /// Interleaved input length is not a whole number of frames.
    MisalignedFrames { len: usize, channels: usize },
}

impl fmt::Display for RateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateError::InvalidRate(r) => {
                write!(f, "invalid sample rate: {}. Must be positive and finite.", r)
            }
            RateError::InvalidChannels(c) => {
                write!(f, "invalid channel count: {}. Must be at least 1.", c)
            }
            RateError::InvalidOverride {
                name,
                value,
                min,
                max,
            } => write!(
                f,
                "override {} = {} out of range [{}, {}]",
                name, value, min, max
            ),
            RateError::OverrideNotAllowed(name) => {
                write!(f, "override {} not allowed with this quality preset", name)
            }
            RateError::ConflictingOverrides(msg) => {
                write!(f, "conflicting overrides: {}", msg)
            }
            RateError::CutoffAboveNyquist { passband, nyquist } => write!(
                f,
                "filter pass-band edge {} at or beyond Nyquist {}",
                passband, nyquist
            ),
            RateError::NonFiniteInput => write!(f, "input contains NaN or infinite samples"),
            RateError::MisalignedFrames { len, channels } => write!(
                f,
                "interleaved input length {} is not a multiple of {} channels",
                len, channels
            ),
        }
    }
}

impl std::error::Error for RateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_values() {
        let err = RateError::InvalidRate(0.0);
        assert!(err.to_string().contains('0'));

        let err = RateError::CutoffAboveNyquist {
            passband: 1.2,
            nyquist: 1.0,
        };
        assert!(err.to_string().contains("1.2"));
    }
}
