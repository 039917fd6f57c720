//! Individual conversion stages and their processing kernels.
//!
//! A stage owns its input FIFO; its output is whatever FIFO the caller
//! hands to [`Stage::process`], which in a cascade is the next stage's
//! input. Each stage keeps `pre` history samples and `pre_post - pre`
//! future samples resident around the window it reads, so kernels can
//! index a few samples either side of the nominal read position.

use std::sync::Arc;

use rustfft::num_complex::Complex;

use crate::fft::FftContext;
use crate::fifo::SampleFifo;
use crate::filter::DftFilter;

const FRAC_SCALE: f64 = 65536.0 * 65536.0 * 65536.0 * 65536.0; // 2^64

/// 64.64 fixed-point sample clock.
///
/// Wide enough that irrational ratio error stays below one sample over
/// any realistic stream length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    pub integer: i64,
    pub fraction: u64,
}

impl FixedClock {
    pub fn from_f64(x: f64) -> Self {
        let floor = x.floor();
        let mut integer = floor as i64;
        let frac = ((x - floor) * FRAC_SCALE).round() as u128;
        let fraction = if frac >= 1u128 << 64 {
            integer += 1;
            0
        } else {
            frac as u64
        };
        Self { integer, fraction }
    }

    #[inline]
    pub fn advance(&mut self, step: FixedClock) {
        let (fraction, carry) = self.fraction.overflowing_add(step.fraction);
        self.fraction = fraction;
        self.integer += step.integer + carry as i64;
    }

    /// Fractional part in [0, 1).
    #[inline]
    pub fn fraction_f64(&self) -> f64 {
        self.fraction as f64 / FRAC_SCALE
    }

    pub fn to_f64(self) -> f64 {
        self.integer as f64 + self.fraction_f64()
    }
}

/// Polyphase coefficient bank shared read-only between channels.
///
/// Holds `phases + 1` rows of `num_coefs` taps; row `p + 1` continues
/// row `p` so a fractional phase can be linearly interpolated between
/// adjacent rows without wrap-around logic in the inner loop.
#[derive(Debug)]
pub struct PolyBank {
    rows: Vec<f64>,
    pub num_coefs: usize,
    pub phases: usize,
}

impl PolyBank {
    /// Distributes the prototype filter `h` over `phases` branches.
    ///
    /// Branch `p`, tap `t` takes `h[(num_coefs - 1 - t) * phases + p - 1]`,
    /// i.e. each branch is the time-reversed comb of every `phases`-th
    /// prototype tap; out-of-range prototype indices contribute zero.
    pub fn new(h: &[f64], num_coefs: usize, phases: usize) -> Self {
        let mut rows = vec![0.0f64; (phases + 1) * num_coefs];
        for q in 0..=phases {
            for t in 0..num_coefs {
                let idx = ((num_coefs - 1 - t) * phases + q) as isize - 1;
                if idx >= 0 && (idx as usize) < h.len() {
                    rows[q * num_coefs + t] = h[idx as usize];
                }
            }
        }
        Self {
            rows,
            num_coefs,
            phases,
        }
    }

    #[inline]
    fn row(&self, p: usize) -> &[f64] {
        &self.rows[p * self.num_coefs..(p + 1) * self.num_coefs]
    }
}

/// Output-clock state of a polyphase stage.
#[derive(Debug, Clone)]
pub enum PolyClock {
    /// Exact integer accumulator in units of 1/L input samples; never
    /// drifts, used whenever the ratio is rational.
    Rational { at: u64, step: u64, l: u64 },
    /// 64.64 clock for irrational ratios; the phase index is the top
    /// `phase_bits` of the fraction and the remainder interpolates
    /// between adjacent coefficient rows.
    Irrational {
        at: FixedClock,
        step: FixedClock,
        phase_bits: u32,
    },
}

#[derive(Debug)]
enum StageKind {
    HalfBand {
        coefs: &'static [f64],
    },
    Cubic {
        at: FixedClock,
        step: FixedClock,
        out_in_ratio: f64,
    },
    Poly {
        bank: Arc<PolyBank>,
        clock: PolyClock,
        out_in_ratio: f64,
    },
    Dft {
        ctx: Arc<FftContext>,
        filter: Arc<DftFilter>,
        l: usize,
        /// Decimation factor; negative `-m` selects the spectral
        /// truncation path, halving the rate `m` times in the
        /// frequency domain.
        step: i32,
        rem_l: usize,
        rem_m: usize,
        work: Vec<Complex<f64>>,
        small: Vec<Complex<f64>>,
    },
}

/// One link of the conversion cascade.
#[derive(Debug)]
pub struct Stage {
    pub fifo: SampleFifo,
    /// Past samples kept before the read position.
    pub pre: usize,
    /// `pre` plus future samples kept after it.
    pub pre_post: usize,
    /// Zero samples pre-loaded to absorb the filter's group delay.
    pub preload: usize,
    kind: StageKind,
}

impl Stage {
    pub fn half_band(coefs: &'static [f64]) -> Self {
        let pre_post = 4 * coefs.len();
        Self {
            fifo: SampleFifo::new(),
            pre: pre_post / 2,
            pre_post,
            preload: pre_post / 2,
            kind: StageKind::HalfBand { coefs },
        }
    }

    pub fn cubic(step: f64) -> Self {
        let step = FixedClock::from_f64(step);
        Self {
            fifo: SampleFifo::new(),
            pre: 1,
            pre_post: 3.max(step.integer as usize),
            preload: 1,
            kind: StageKind::Cubic {
                at: FixedClock::from_f64(0.0),
                step,
                out_in_ratio: 1.0 / FixedClock::to_f64(step),
            },
        }
    }

    pub fn poly(bank: Arc<PolyBank>, clock: PolyClock, out_in_ratio: f64) -> Self {
        let num_coefs = bank.num_coefs;
        Self {
            fifo: SampleFifo::new(),
            pre: 0,
            pre_post: num_coefs - 1,
            preload: (num_coefs - 1) >> 1,
            kind: StageKind::Poly {
                bank,
                clock,
                out_in_ratio,
            },
        }
    }

    /// A DFT convolution stage interpolating by `l` then decimating by `m`.
    ///
    /// `spectral_decimate` selects the frequency-domain rate halving used
    /// when the filter passband allows it (m of 2 or 4 at full bandwidth).
    pub fn dft(
        ctx: Arc<FftContext>,
        filter: Arc<DftFilter>,
        l: usize,
        m: usize,
        spectral_decimate: bool,
    ) -> Self {
        let preload = filter.post_peak / l;
        let rem_l = filter.post_peak % l;
        let step = if spectral_decimate {
            -((m / 2) as i32)
        } else {
            m as i32
        };
        Self {
            fifo: SampleFifo::new(),
            pre: 0,
            pre_post: 0,
            preload,
            kind: StageKind::Dft {
                ctx,
                filter,
                l,
                step,
                rem_l,
                rem_m: 0,
                work: Vec::new(),
                small: Vec::new(),
            },
        }
    }

    /// Runs the stage over everything currently available, appending the
    /// results to `output`.
    pub fn process(&mut self, output: &mut SampleFifo) {
        let Stage {
            fifo,
            pre,
            pre_post,
            kind,
            ..
        } = self;
        let num_in = fifo.occupancy().saturating_sub(*pre_post);
        match kind {
            StageKind::HalfBand { coefs } => {
                let num_out = (num_in + 1) / 2;
                let centre = *pre;
                let input = fifo.valid();
                let out = output.reserve(num_out);
                for (i, o) in out.iter_mut().enumerate() {
                    let c = centre + 2 * i;
                    let mut sum = input[c] * 0.5;
                    for (j, &h) in coefs.iter().enumerate() {
                        let k = 2 * j + 1;
                        sum += (input[c - k] + input[c + k]) * h;
                    }
                    *o = sum;
                }
                fifo.consume(2 * num_out);
            }
            StageKind::Cubic {
                at,
                step,
                out_in_ratio,
            } => {
                let max_out = 1 + (num_in as f64 * *out_in_ratio) as usize;
                let base = *pre;
                let input = fifo.valid();
                let out = output.reserve(max_out);
                let mut produced = 0;
                while (at.integer as usize) < num_in {
                    let s = &input[base + at.integer as usize - 1..];
                    let x = at.fraction_f64();
                    let b = 0.5 * (s[2] + s[0]) - s[1];
                    let a = (1.0 / 6.0) * (s[3] - s[2] + s[0] - s[1] - 4.0 * b);
                    let c = s[2] - s[1] - a - b;
                    out[produced] = ((a * x + b) * x + c) * x + s[1];
                    produced += 1;
                    at.advance(*step);
                }
                output.trim_by(max_out - produced);
                let consumed = at.integer as usize;
                fifo.consume(consumed);
                at.integer = 0;
            }
            StageKind::Poly {
                bank,
                clock,
                out_in_ratio,
            } => {
                let max_out = 1 + (num_in as f64 * *out_in_ratio) as usize;
                let input = fifo.valid();
                let out = output.reserve(max_out);
                let mut produced = 0;
                let consumed;
                match clock {
                    PolyClock::Rational { at, step, l } => {
                        while *at / *l < num_in as u64 {
                            let base = (*at / *l) as usize;
                            let row = bank.row((*at % *l) as usize);
                            let mut sum = 0.0;
                            for (j, &h) in row.iter().enumerate() {
                                sum += h * input[base + j];
                            }
                            out[produced] = sum;
                            produced += 1;
                            *at += *step;
                        }
                        consumed = (*at / *l) as usize;
                        *at %= *l;
                    }
                    PolyClock::Irrational {
                        at,
                        step,
                        phase_bits,
                    } => {
                        while (at.integer as usize) < num_in {
                            let base = at.integer as usize;
                            let phase = (at.fraction >> (64 - *phase_bits)) as usize;
                            let x = (at.fraction << *phase_bits) as f64 / FRAC_SCALE;
                            let row0 = bank.row(phase);
                            let row1 = bank.row(phase + 1);
                            let mut sum = 0.0;
                            for j in 0..bank.num_coefs {
                                sum += (row0[j] + (row1[j] - row0[j]) * x) * input[base + j];
                            }
                            out[produced] = sum;
                            produced += 1;
                            at.advance(*step);
                        }
                        consumed = at.integer as usize;
                        at.integer = 0;
                    }
                }
                output.trim_by(max_out - produced);
                fifo.consume(consumed);
            }
            StageKind::Dft {
                ctx,
                filter,
                l,
                step,
                rem_l,
                rem_m,
                work,
                small,
            } => {
                dft_stage(
                    fifo, output, ctx, filter, *l, *step, rem_l, rem_m, work, small,
                );
            }
        }
    }
}

/// Overlap-discard block convolution with combined rate change.
#[allow(clippy::too_many_arguments)]
fn dft_stage(
    fifo: &mut SampleFifo,
    output: &mut SampleFifo,
    ctx: &FftContext,
    filter: &DftFilter,
    l: usize,
    step: i32,
    rem_l: &mut usize,
    rem_m: &mut usize,
    work: &mut Vec<Complex<f64>>,
    small: &mut Vec<Complex<f64>>,
) {
    let n = filter.dft_length;
    let overlap = filter.overlap();

    while *rem_l + l * fifo.occupancy() >= n {
        let needed = n - overlap - *rem_l + l - 1;
        let consume = needed / l;
        let rem = needed % l;

        work.clear();
        work.resize(n, Complex::new(0.0, 0.0));
        {
            let input = fifo.valid();
            if l > 1 && l.is_power_of_two() && *rem_l == 0 {
                // Zero-stuffing by a power of two replicates the small
                // spectrum across the block, so transform only n/l points.
                let portion = n / l;
                small.clear();
                small.extend(input[..portion].iter().map(|&s| Complex::new(s, 0.0)));
                ctx.forward(small);
                for (k, w) in work.iter_mut().enumerate() {
                    *w = small[k % portion];
                }
            } else if l == 1 {
                for (w, &s) in work.iter_mut().zip(input[..n].iter()) {
                    w.re = s;
                }
                ctx.forward(work);
            } else {
                let mut j = 0;
                let mut i = *rem_l;
                while i < n {
                    work[i].re = input[j];
                    j += 1;
                    i += l;
                }
                *rem_l = l - 1 - rem;
                ctx.forward(work);
            }
        }
        fifo.consume(consume);

        if step > 0 {
            for (w, c) in work.iter_mut().zip(filter.spectrum.iter()) {
                *w *= c;
            }
            ctx.inverse(work);
            let m = step as usize;
            let out = output.reserve(n);
            if m == 1 {
                for (o, w) in out.iter_mut().zip(work[..n - overlap].iter()) {
                    *o = w.re;
                }
                output.trim_by(overlap);
            } else {
                let mut produced = 0;
                let mut i = *rem_m;
                while i < n - overlap {
                    out[produced] = work[i].re;
                    produced += 1;
                    i += m;
                }
                *rem_m = i - (n - overlap);
                output.trim_by(n - produced);
            }
        } else {
            // Spectral rate halving: keep only the low bins and inverse
            // transform at the reduced length.
            let m = (-step) as u32;
            let ns = n >> m;
            small.clear();
            small.resize(ns, Complex::new(0.0, 0.0));
            small[0] = work[0] * filter.spectrum[0];
            for k in 1..ns / 2 {
                small[k] = work[k] * filter.spectrum[k];
                small[ns - k] = small[k].conj();
            }
            small[ns / 2] = Complex::new((work[ns / 2] * filter.spectrum[ns / 2]).re, 0.0);
            ctx.inverse(small);
            let scale = 1.0 / (1u32 << m) as f64;
            let emit = (n - overlap) >> m;
            let out = output.reserve(emit);
            for (o, s) in out.iter_mut().zip(small[..emit].iter()) {
                *o = s.re * scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::{design_lpf, TapRounding, Window};
    use crate::rate::half_fir::select_half_fir;

    fn pump(stage: &mut Stage, input: &[f64], chunk: usize) -> Vec<f64> {
        let mut out = SampleFifo::new();
        stage.fifo.write_zeros(stage.preload);
        for block in input.chunks(chunk) {
            stage.fifo.write(block);
            stage.process(&mut out);
        }
        // Zero-pad to flush the tail.
        stage.fifo.write_zeros(4096);
        stage.process(&mut out);
        out.valid().to_vec()
    }

    #[test]
    fn fixed_clock_accumulates_exactly() {
        let step = FixedClock::from_f64(1.5);
        let mut at = FixedClock::from_f64(0.0);
        for _ in 0..4 {
            at.advance(step);
        }
        assert_eq!(at.integer, 6);
        assert_eq!(at.fraction, 0);
    }

    #[test]
    fn fixed_clock_carry() {
        let mut at = FixedClock::from_f64(0.75);
        at.advance(FixedClock::from_f64(0.75));
        assert_eq!(at.integer, 1);
        assert!((at.fraction_f64() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn half_band_dc_and_count() {
        let fir = select_half_fir(120.0);
        let mut stage = Stage::half_band(fir.coefs);
        let input = vec![1.0; 4000];
        let out = pump(&mut stage, &input, 512);
        assert!(out.len() >= 2000);
        // Settled region passes DC at unity.
        for &s in &out[100..1900] {
            assert!((s - 1.0).abs() < 1e-6, "dc leak: {}", s);
        }
    }

    #[test]
    fn cubic_tracks_a_ramp() {
        let mut stage = Stage::cubic(44100.0 / 48000.0);
        let input: Vec<f64> = (0..2000).map(|i| i as f64).collect();
        let out = pump(&mut stage, &input, 333);
        // Interior outputs follow the ramp at the stepped positions.
        let step = 44100.0 / 48000.0;
        for (i, &s) in out.iter().enumerate().skip(10).take(1500) {
            let expect = i as f64 * step;
            assert!((s - expect).abs() < 1e-6, "at {}: {} vs {}", i, s, expect);
        }
    }

    #[test]
    fn poly_rational_dc() {
        // 3:2 downsample, prototype designed for 2 phases.
        let phases = 2usize;
        let h = design_lpf(
            0.4 / 3.0,
            0.5 / 3.0,
            1.0,
            120.0,
            0,
            TapRounding::Phases(phases),
            Window::default(),
        )
        .unwrap();
        let num_coefs = h.len() / phases + 1;
        let bank = Arc::new(PolyBank::new(&h, num_coefs, phases));
        let clock = PolyClock::Rational {
            at: 0,
            step: 3,
            l: 2,
        };
        let mut stage = Stage::poly(bank, clock, 2.0 / 3.0);
        let out = pump(&mut stage, &vec![1.0; 6000], 500);
        assert!(out.len() >= 3800);
        for &s in &out[200..3600] {
            assert!((s - 1.0).abs() < 1e-4, "dc leak: {}", s);
        }
    }

    #[test]
    fn dft_stage_identity_filter_passband() {
        // 1:1 stage; DC must survive block convolution and overlap
        // bookkeeping.
        let ctx = Arc::new(FftContext::new());
        let taps = design_lpf(
            0.45,
            0.55,
            1.0,
            100.0,
            0,
            TapRounding::Multiple(4),
            Window::default(),
        )
        .unwrap();
        let post_peak = taps.len() / 2;
        let filter = Arc::new(DftFilter::new(&ctx, &taps, post_peak, 1));
        let mut stage = Stage::dft(Arc::clone(&ctx), filter, 1, 1, false);
        let out = pump(&mut stage, &vec![1.0; 8000], 1024);
        assert!(out.len() >= 7000);
        for &s in &out[500..6500] {
            assert!((s - 1.0).abs() < 1e-5, "dc leak: {}", s);
        }
    }

    #[test]
    fn dft_stage_decimation_count() {
        let ctx = Arc::new(FftContext::new());
        let taps = design_lpf(
            0.2,
            0.25,
            1.0,
            100.0,
            0,
            TapRounding::Multiple(4),
            Window::default(),
        )
        .unwrap();
        let post_peak = taps.len() / 2;
        let filter = Arc::new(DftFilter::new(&ctx, &taps, post_peak, 1));
        let mut stage = Stage::dft(Arc::clone(&ctx), filter, 1, 3, false);
        let input = vec![1.0; 30000];
        let out = pump(&mut stage, &input, 1000);
        // Roughly one output per three inputs.
        assert!(out.len() >= 9000);
        for &s in &out[500..8500] {
            assert!((s - 1.0).abs() < 1e-5, "dc leak: {}", s);
        }
    }
}
