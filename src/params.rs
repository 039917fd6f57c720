//! Conversion parameters: quality presets and explicit numeric overrides.
//!
//! A conversion is described by the two sample rates plus either a
//! [`QualityPreset`] or explicit overrides (bit-accuracy, phase response,
//! bandwidth percentages). The presets and the derived-bandwidth formulas
//! follow the classic resampler quality table:
//!
//! | preset    | band-width | rejection | typical use            |
//! |-----------|------------|-----------|------------------------|
//! | quick     | n/a        | ~30 dB    | preview, scrubbing     |
//! | low       | 80 %       | 100 dB    | playback on old gear   |
//! | medium    | 95 %       | 100 dB    | audio playback         |
//! | high      | 95 %       | 125 dB    | 16-bit mastering       |
//! | very high | 95 %       | 175 dB    | 24-bit mastering       |

use crate::error::RateError;

/// 20·log10(2): decibels per bit of accuracy.
pub(crate) const DB_PER_BIT: f64 = 6.020599913279624;

/// Low preset 0 dB bandwidth, percent.
pub(crate) const LOW_Q_BW0_PC: f64 = 67.0 + 5.0 / 8.0;

/// Maps stop-band rejection to the 6 dB / 3 dB transition-width ratio.
pub(crate) fn to_3db(att: f64) -> f64 {
    (1.6e-6 * att - 7.5e-4) * att + 0.646
}

/// Quality presets, from cheapest to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    /// Cubic interpolation only; no filter design. ~30 dB alias rejection.
    Quick,
    /// 16-bit accuracy, 80 % bandwidth, medium roll-off.
    Low,
    /// 16-bit accuracy, 95 % bandwidth, medium roll-off.
    Medium,
    /// 20-bit accuracy, 95 % bandwidth. The default.
    High,
    /// 28-bit accuracy, for 24-bit mastering.
    VeryHigh,
}

impl QualityPreset {
    fn bits(self) -> f64 {
        match self {
            QualityPreset::Quick => 0.0,
            QualityPreset::Low | QualityPreset::Medium => 16.0,
            QualityPreset::High => 20.0,
            QualityPreset::VeryHigh => 28.0,
        }
    }

    fn rolloff(self) -> Rolloff {
        match self {
            QualityPreset::Quick | QualityPreset::Low | QualityPreset::Medium => Rolloff::Medium,
            QualityPreset::High | QualityPreset::VeryHigh => Rolloff::Small,
        }
    }

    /// Quick and Low reject explicit overrides.
    fn allows_overrides(self) -> bool {
        !matches!(self, QualityPreset::Quick | QualityPreset::Low)
    }
}

/// Permitted pass-band roll-off at the rate-band edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rolloff {
    /// No roll-off constraint (steepest possible filters).
    None,
    /// At most 0.01 dB.
    Small,
    /// At most 0.35 dB.
    Medium,
}

/// Parameters for one logical rate conversion.
///
/// Built with the usual `with_*` chain:
///
/// ```
/// use rateconv::{ConvertParams, QualityPreset};
///
/// let params = ConvertParams::new(44100.0, 48000.0)
///     .unwrap()
///     .with_channels(2)
///     .with_preset(QualityPreset::Medium);
/// assert!((params.ratio() - 44100.0 / 48000.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct ConvertParams {
    /// Source sample rate in Hz.
    pub input_rate: f64,
    /// Destination sample rate in Hz.
    pub output_rate: f64,
    /// Number of interleaved channels (default 1).
    pub channels: usize,
    /// Quality preset (default High).
    pub preset: QualityPreset,
    bits: Option<f64>,
    rejection_db: Option<f64>,
    phase_pc: Option<f64>,
    bw_0db_pc: Option<f64>,
    bw_3db_pc: Option<f64>,
    anti_aliasing_pc: Option<f64>,
    allow_aliasing: bool,
    rolloff: Option<Rolloff>,
}

impl ConvertParams {
    /// Creates parameters for converting `input_rate` to `output_rate`.
    ///
    /// # Errors
    /// Returns [`RateError::InvalidRate`] if either rate is not positive
    /// and finite.
    pub fn new(input_rate: f64, output_rate: f64) -> Result<Self, RateError> {
        for &r in &[input_rate, output_rate] {
            if !r.is_finite() || r <= 0.0 {
                return Err(RateError::InvalidRate(r));
            }
        }
        Ok(Self {
            input_rate,
            output_rate,
            channels: 1,
            preset: QualityPreset::High,
            bits: None,
            rejection_db: None,
            phase_pc: None,
            bw_0db_pc: None,
            bw_3db_pc: None,
            anti_aliasing_pc: None,
            allow_aliasing: false,
            rolloff: None,
        })
    }

    /// Input rate divided by output rate. Greater than 1 when down-sampling.
    pub fn ratio(&self) -> f64 {
        self.input_rate / self.output_rate
    }

    /// Sets the number of interleaved channels.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the quality preset.
    pub fn with_preset(mut self, preset: QualityPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Overrides the required bit-accuracy (pass + stop), 15–33.
    pub fn with_bits(mut self, bits: f64) -> Self {
        self.bits = Some(bits);
        self
    }

    /// Overrides the stop-band rejection in dB, 90–200. Converted to bits.
    pub fn with_rejection_db(mut self, rejection: f64) -> Self {
        self.rejection_db = Some(rejection);
        self
    }

    /// Sets the phase response: 0 = minimum, 25 = intermediate,
    /// 50 = linear (default), 100 = maximum.
    pub fn with_phase(mut self, phase_pc: f64) -> Self {
        self.phase_pc = Some(phase_pc);
        self
    }

    /// Minimum-phase filters (phase response 0 %).
    pub fn minimum_phase(self) -> Self {
        self.with_phase(0.0)
    }

    /// Intermediate-phase filters (phase response 25 %).
    pub fn intermediate_phase(self) -> Self {
        self.with_phase(25.0)
    }

    /// Linear-phase filters (phase response 50 %). The default.
    pub fn linear_phase(self) -> Self {
        self.with_phase(50.0)
    }

    /// Sets the preserved pass-band (0 dB point) as a percentage of the
    /// destination Nyquist, 53–99.5.
    pub fn with_bandwidth(mut self, bw_0db_pc: f64) -> Self {
        self.bw_0db_pc = Some(bw_0db_pc);
        self
    }

    /// Sets the 3 dB bandwidth percentage, 74–99.7. Mutually exclusive with
    /// [`ConvertParams::with_bandwidth`].
    pub fn with_bandwidth_3db(mut self, bw_3db_pc: f64) -> Self {
        self.bw_3db_pc = Some(bw_3db_pc);
        self
    }

    /// Steep filter: 99 % 3 dB bandwidth.
    pub fn steep_filter(self) -> Self {
        self.with_bandwidth_3db(99.0)
    }

    /// Sets the alias-free bandwidth percentage, 85–100. Implies
    /// [`ConvertParams::allow_aliasing`] when below 100.
    pub fn with_anti_aliasing(mut self, anti_aliasing_pc: f64) -> Self {
        self.anti_aliasing_pc = Some(anti_aliasing_pc);
        self
    }

    /// Permits aliasing above the pass-band in exchange for a shorter filter.
    pub fn allow_aliasing(mut self, allow: bool) -> Self {
        self.allow_aliasing = allow;
        self
    }

    /// Overrides the pass-band roll-off constraint.
    pub fn with_rolloff(mut self, rolloff: Rolloff) -> Self {
        self.rolloff = Some(rolloff);
        self
    }

    fn check_range(
        name: &'static str,
        value: Option<f64>,
        min: f64,
        max: f64,
    ) -> Result<(), RateError> {
        if let Some(v) = value {
            if !v.is_finite() || v < min || v > max {
                return Err(RateError::InvalidOverride {
                    name,
                    value: v,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Validates the parameters and derives the effective quality numbers.
    pub(crate) fn resolve(&self) -> Result<ResolvedQuality, RateError> {
        if self.channels == 0 {
            return Err(RateError::InvalidChannels(self.channels));
        }
        Self::check_range("bits", self.bits, 15.0, 33.0)?;
        Self::check_range("rejection_db", self.rejection_db, 90.0, 200.0)?;
        Self::check_range("phase", self.phase_pc, 0.0, 100.0)?;
        Self::check_range("bandwidth", self.bw_0db_pc, 53.0, 99.5)?;
        Self::check_range("bandwidth_3db", self.bw_3db_pc, 74.0, 99.7)?;
        Self::check_range("anti_aliasing", self.anti_aliasing_pc, 85.0, 100.0)?;

        let has_override = self.bits.is_some()
            || self.rejection_db.is_some()
            || self.phase_pc.is_some()
            || self.bw_0db_pc.is_some()
            || self.bw_3db_pc.is_some()
            || self.anti_aliasing_pc.is_some()
            || self.allow_aliasing
            || self.rolloff.is_some();
        if has_override && !self.preset.allows_overrides() {
            return Err(RateError::OverrideNotAllowed("quality overrides"));
        }
        if self.bw_0db_pc.is_some() && self.bw_3db_pc.is_some() {
            return Err(RateError::ConflictingOverrides(
                "bandwidth and bandwidth_3db are mutually exclusive",
            ));
        }
        if self.bits.is_some() && self.rejection_db.is_some() {
            return Err(RateError::ConflictingOverrides(
                "bits and rejection_db are mutually exclusive",
            ));
        }

        let bits = match (self.rejection_db, self.bits) {
            (Some(rej), _) => rej / DB_PER_BIT,
            (None, Some(bits)) => bits,
            (None, None) => self.preset.bits(),
        };
        let rej = bits * DB_PER_BIT;
        let rolloff = self.rolloff.unwrap_or_else(|| self.preset.rolloff());
        let phase = self.phase_pc.unwrap_or(50.0);
        let allow_aliasing = self.allow_aliasing || self.anti_aliasing_pc.is_some();

        // Derive the two bandwidth figures from whichever was given.
        let mut maintain_3db_pt = true;
        let (bw_0db, bw_3db) = match (self.bw_0db_pc, self.bw_3db_pc) {
            (None, None) => {
                maintain_3db_pt = false;
                let bw0 = if self.preset == QualityPreset::Low {
                    LOW_Q_BW0_PC
                } else {
                    100.0 - 5.0 / to_3db(rej)
                };
                (bw0, 100.0 - (100.0 - bw0) * to_3db(rej))
            }
            (Some(bw0), None) => {
                maintain_3db_pt = false;
                (bw0, 100.0 - (100.0 - bw0) * to_3db(rej))
            }
            (None, Some(bw3)) => (100.0 - (100.0 - bw3) / to_3db(rej), bw3),
            (Some(_), Some(_)) => unreachable!(),
        };
        if allow_aliasing {
            if self.bw_3db_pc.is_some() && bw_3db < 85.0 {
                return Err(RateError::ConflictingOverrides(
                    "minimum 3 dB bandwidth with aliasing is 85%",
                ));
            }
            if self.bw_0db_pc.is_some() && bw_0db < 74.0 {
                return Err(RateError::ConflictingOverrides(
                    "minimum bandwidth with aliasing is 74%",
                ));
            }
        }
        let anti_aliasing_pc = match self.anti_aliasing_pc {
            Some(a) => a,
            None if allow_aliasing => bw_3db,
            None => 100.0,
        };

        Ok(ResolvedQuality {
            bits,
            phase,
            bw_0db_pc: bw_0db,
            anti_aliasing_pc,
            rolloff,
            maintain_3db_pt,
        })
    }
}

/// The effective quality numbers fed to cascade planning.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedQuality {
    /// Required bit-accuracy (0 selects the cubic stage).
    pub bits: f64,
    /// Phase response percentage, 0–100.
    pub phase: f64,
    /// Preserved pass-band (0 dB point), percent of destination Nyquist.
    pub bw_0db_pc: f64,
    /// Alias-free bandwidth, percent.
    pub anti_aliasing_pc: f64,
    /// Pass-band roll-off constraint.
    pub rolloff: Rolloff,
    /// Whether the 3 dB point was given explicitly and must be maintained.
    pub maintain_3db_pt: bool,
}
