//! Cascade planning: turning a conversion ratio and quality target into a
//! concrete chain of stages.
//!
//! The planner strips powers of two from the ratio into half-band stages,
//! then decides between a pre-interpolation DFT stage, a variable-ratio
//! middle stage (polyphase, or cubic at the Quick preset) and a
//! post-decimation DFT stage. Rational ratios are detected so the middle
//! stage can run on an exact integer clock; small integer ratios collapse
//! into a single DFT stage. All designed filters live behind `Arc` so that
//! every channel of a conversion shares one coefficient set.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::RateError;
use crate::fft::FftContext;
use crate::filter::design::{lpf_tap_count, TapRounding};
use crate::filter::{design_lpf, fir_to_phase, DftFilter, Window};
use crate::params::{to_3db, ConvertParams, ResolvedQuality, Rolloff, DB_PER_BIT, LOW_Q_BW0_PC};
use crate::rate::half_fir::select_half_fir;
use crate::rate::stage::{FixedClock, PolyBank, PolyClock, Stage};

const MULT32: f64 = 65536.0 * 65536.0;

/// Blueprint for one stage; immutable, shared between channels.
#[derive(Debug, Clone)]
pub(crate) enum StagePlan {
    HalfBand {
        coefs: &'static [f64],
    },
    Cubic {
        step: f64,
    },
    Poly {
        bank: Arc<PolyBank>,
        clock: PolyClock,
        out_in_ratio: f64,
    },
    Dft {
        filter: Arc<DftFilter>,
        l: usize,
        m: usize,
        spectral: bool,
    },
}

impl StagePlan {
    pub(crate) fn instantiate(&self, ctx: &Arc<FftContext>) -> Stage {
        match self {
            StagePlan::HalfBand { coefs } => Stage::half_band(coefs),
            StagePlan::Cubic { step } => Stage::cubic(*step),
            StagePlan::Poly {
                bank,
                clock,
                out_in_ratio,
            } => Stage::poly(Arc::clone(bank), clock.clone(), *out_in_ratio),
            StagePlan::Dft {
                filter,
                l,
                m,
                spectral,
            } => Stage::dft(Arc::clone(ctx), Arc::clone(filter), *l, *m, *spectral),
        }
    }
}

/// An immutable conversion recipe: the stage chain and its shared filters.
///
/// Built once per (ratio, quality) pair; each channel then instantiates its
/// own stateful [`crate::rate::RateConverter`] from it.
#[derive(Debug)]
pub struct CascadePlan {
    factor: f64,
    ctx: Arc<FftContext>,
    pub(crate) stages: Vec<StagePlan>,
}

impl CascadePlan {
    /// Plans the cascade for `params`, designing all filters up front.
    ///
    /// # Errors
    /// Propagates configuration validation failures and filter-design
    /// failures (cutoff at or beyond Nyquist).
    pub fn new(params: &ConvertParams, ctx: Arc<FftContext>) -> Result<Self, RateError> {
        let quality = params.resolve()?;
        let factor = params.ratio();
        let stages = plan_stages(&quality, factor, &ctx)?;
        if stages.is_empty() && factor != 1.0 {
            warn!(
                "rates {} and {} too close, conversion is a passthrough",
                params.input_rate, params.output_rate
            );
        }
        Ok(Self {
            factor,
            ctx,
            stages,
        })
    }

    /// Input rate divided by output rate.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// True when the plan performs no work and input passes through
    /// bit-identically.
    pub fn is_passthrough(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of stages in the cascade.
    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    pub(crate) fn context(&self) -> &Arc<FftContext> {
        &self.ctx
    }
}

/// Designs one DFT stage: low-pass at the stage's band edges, optional
/// phase reshaping, then the pre-transformed filter.
#[allow(clippy::too_many_arguments)]
fn plan_dft_stage(
    ctx: &Arc<FftContext>,
    fp: f64,
    fs: f64,
    f_nyq: f64,
    att: f64,
    phase: f64,
    l: usize,
    m: usize,
) -> Result<StagePlan, RateError> {
    // Power-of-two interpolation with linear phase keeps the taps aligned
    // to 2L so the group-delay peak lands on a whole input sample.
    let k = if phase == 50.0 && l.is_power_of_two() && f_nyq == l as f64 {
        2 * l
    } else {
        4
    };
    let mut taps = design_lpf(fp, fs, f_nyq, att, 0, TapRounding::Multiple(k), Window::default())?;
    let post_peak = if phase != 50.0 {
        let (reshaped, post_peak) = fir_to_phase(ctx, taps, phase);
        taps = reshaped;
        post_peak
    } else {
        taps.len() / 2
    };
    let spectral = l == 1 && (m == 2 || m == 4) && fs == 1.0;
    let filter = Arc::new(DftFilter::new(ctx, &taps, post_peak, l));
    debug!(
        "fir_len={} dft_length={} Fp={:.6} Fs={:.6} Fn={} att={:.2} {}/{}",
        filter.num_taps, filter.dft_length, fp, fs, f_nyq, att, l, m
    );
    Ok(StagePlan::Dft {
        filter,
        l,
        m,
        spectral,
    })
}

fn plan_stages(
    q: &ResolvedQuality,
    factor: f64,
    ctx: &Arc<FftContext>,
) -> Result<Vec<StagePlan>, RateError> {
    let bits = q.bits;
    let phase = q.phase;
    let mut att = (bits + 1.0) * DB_PER_BIT;
    let mut att_arb = att;
    let tbw0 = 1.0 - q.bw_0db_pc / 100.0;
    let fs_a = 2.0 - q.anti_aliasing_pc / 100.0;
    let mut tbw_tighten = 1.0;

    let mut arb_m = factor;
    let mut arb_l: i64 = 1;
    let mut pre_l: i64 = 1;
    let mut pre_m: i64 = 1;
    let mut post_l: i64 = 1;
    let mut post_m: i64 = 1;
    let mut shift = 0usize;
    let mut upsample = false;
    let mut rational = false;
    let mut mode: i32 = if q.rolloff > Rolloff::Small {
        (factor > 1.0 || q.bw_0db_pc > LOW_Q_BW0_PC) as i32
    } else {
        (2.0 + (bits - 17.0) / 4.0).ceil() as i32
    };

    if bits != 0.0 {
        // Determine the stage split; a retry re-plans after the combined
        // post-interpolation factor or the filter mode changes.
        let mut n = 0;
        while n == 0 {
            n = 1;
            let max_l: i64 = if mode != 0 {
                2048
            } else {
                (400.0_f64 * 1000.0 / (42.0 * 8.0)).ceil() as i64
            };
            upsample = arb_m < 1.0;
            shift = 0;
            let mut i = (arb_m * 0.5) as i64;
            loop {
                i >>= 1;
                if i == 0 {
                    break;
                }
                arb_m *= 0.5;
                shift += 1;
            }
            let pre_m_flag = upsample || (arb_m > 1.5 && arb_m < 2.0);
            post_m = 1 + (arb_m > 1.0 && pre_m_flag) as i64;
            arb_m /= post_m as f64;
            pre_l = 1
                + (!pre_m_flag && arb_m < 2.0) as i64
                + (upsample && mode != 0) as i64;
            arb_m *= pre_l as f64;
            pre_m = pre_m_flag as i64;

            let frac = arb_m - arb_m.floor();
            rational = frac == 0.0;
            let epsilon = if rational {
                0.0
            } else {
                let scaled = frac * MULT32;
                ((scaled + 0.5).floor() / scaled - 1.0).abs()
            };
            let mut i = 1i64;
            while i <= max_l && !rational {
                let d = frac * i as f64;
                let guess = (d + 0.5) as i64;
                if (guess as f64 / d - 1.0).abs() <= epsilon {
                    rational = true;
                    if guess == i {
                        arb_m = arb_m.ceil();
                        if arb_m > 2.0 {
                            shift += 1;
                            arb_m /= 2.0;
                        }
                    } else {
                        arb_m = (i * arb_m as i64 + guess) as f64;
                        arb_l = i;
                    }
                }
                i += 1;
            }
            let mut l = pre_l * arb_l;
            let mut m_int = (arb_m * post_m as f64) as i64;
            if (l | m_int) & 1 == 0 {
                l >>= 1;
                m_int >>= 1;
            }
            let d = pre_l as f64 * arb_l as f64 / arb_m;
            if post_l == 1 && d > 4.0 && d != 5.0 {
                post_l = 4;
                let mut i = (d / 16.0) as i64;
                loop {
                    i >>= 1;
                    if i == 0 {
                        break;
                    }
                    post_l <<= 1;
                }
                arb_m = arb_m * post_l as f64 / arb_l as f64 / pre_l as f64;
                arb_l = 1;
                n = 0;
            } else if rational && (l.max(m_int) < 5 || l * m_int < 6) {
                pre_l = l;
                pre_m = m_int;
                arb_m = 1.0;
                arb_l = 1;
                post_m = 1;
            }
            if mode == 0 && (!rational || n == 0) {
                mode += 1;
                n = 0;
            }
        }
    }

    let have_pre = pre_m * pre_l != 1;
    let have_arb = arb_m * arb_l as f64 != 1.0;
    let have_post = post_m * post_l != 1;
    let num_stages = shift + have_pre as usize + have_arb as usize + have_post as usize;

    let mut stages = Vec::with_capacity(num_stages);
    if num_stages == 0 {
        return Ok(stages);
    }

    // Attenuation budget: the variable-ratio stage absorbs an extra
    // 6 dB of aliasing, the rest is split evenly across the others.
    if num_stages > 1 {
        let mut others = num_stages as f64;
        if have_arb {
            att += DB_PER_BIT;
            att_arb = att;
            others -= 1.0;
        }
        att += 20.0 * others.log10();
    }

    let half = select_half_fir(att);
    for _ in 0..shift {
        stages.push(StagePlan::HalfBand { coefs: half.coefs });
    }

    if have_pre {
        if q.maintain_3db_pt && have_post {
            // Overlapping transition bands; tighten the pre-stage filter
            // to hold the requested 3 dB point.
            let tbw3 = tbw0 * to_3db(att);
            let mut x = ((2.1429e-4 - 5.2083e-7 * att) * att - 0.015863) * att + 3.95;
            x = att
                * ((tbw0 - tbw3) / (post_m as f64 / (factor * post_l as f64) - 1.0 + tbw0))
                    .powf(x);
            if x > 0.035 {
                tbw_tighten = ((4.3074e-3 - 3.9121e-4 * x) * x - 0.040009) * x + 1.0014;
                debug!("x={:.6} tbw_tighten={:.6}", x, tbw_tighten);
            }
        }
        let f_nyq = if pre_m != 0 {
            pre_l.max(pre_m) as f64
        } else {
            arb_m / arb_l as f64
        };
        stages.push(plan_dft_stage(
            ctx,
            1.0 - tbw0 * tbw_tighten,
            fs_a,
            f_nyq,
            att,
            phase,
            pre_l as usize,
            pre_m.max(1) as usize,
        )?);
    }

    if bits == 0.0 {
        if have_arb {
            stages.push(StagePlan::Cubic { step: arb_m });
        }
    } else if have_arb {
        let mult = if upsample { 1.0 } else { arb_l as f64 / arb_m };
        let mut x = 0.5;
        let f_nyq = if !upsample && pre_m != 0 {
            x = arb_m / arb_l as f64;
            x
        } else {
            1.0
        };
        let fp0 = if pre_m == 0 {
            mult
        } else if mode != 0 {
            0.5
        } else {
            1.0
        };
        let fs = 2.0 - fp0;
        let mut fp = fp0 * (1.0 - tbw0);
        if q.rolloff > Rolloff::Small && mode != 0 {
            fp = if pre_m == 0 {
                mult * 0.5 - 0.125
            } else {
                mult * 0.05 + 0.1
            };
        } else if q.rolloff == Rolloff::Small {
            fp = fs - (fs - 0.148 * x - fp * 0.852) * (0.00813 * bits + 0.973);
        }

        if !rational {
            arb_m /= arb_l as f64;
            arb_l = 1;
        }
        let scalar = if bits <= 16.0 {
            10.0
        } else if bits <= 20.0 {
            11.0
        } else {
            12.0
        };
        let phase_bits = ((scalar + mult.log2()).ceil() as i64).clamp(4, 16) as u32;
        let mut phases = if rational {
            arb_l as usize
        } else {
            1usize << phase_bits
        };

        let phases0 = phases.max(19);
        let n0 = lpf_tap_count(fp, fs, f_nyq, att_arb, TapRounding::Phases(phases0))?;
        let mut num_coefs = n0 / phases0 + 1;
        if pre_m == 0 {
            num_coefs += num_coefs & 1;
        }
        let mut arb_l_u = arb_l as u64;
        let mut arb_m_i = arb_m as u64;
        if num_coefs & 1 == 1 && rational && arb_l_u & 1 == 1 {
            phases <<= 1;
            arb_l_u <<= 1;
            arb_m_i *= 2;
        }
        let at = arb_l_u as f64 * 0.5 * (num_coefs & 1) as f64;

        let num_taps = num_coefs * phases - 1;
        let h = design_lpf(
            fp,
            fs,
            f_nyq,
            att_arb,
            num_taps,
            TapRounding::Phases(phases),
            Window::default(),
        )?;
        let bank = Arc::new(PolyBank::new(&h, num_coefs, phases));
        debug!(
            "fir_len={} phases={} rational={} Fp={:.6} Fs={:.6} Fn={}",
            num_coefs, phases, rational, fp, fs, f_nyq
        );
        let (clock, out_in_ratio) = if rational {
            (
                PolyClock::Rational {
                    at: at as u64,
                    step: arb_m_i,
                    l: arb_l_u,
                },
                arb_l_u as f64 / arb_m_i as f64,
            )
        } else {
            (
                PolyClock::Irrational {
                    at: FixedClock::from_f64(at),
                    step: FixedClock::from_f64(arb_m),
                    phase_bits,
                },
                1.0 / arb_m,
            )
        };
        stages.push(StagePlan::Poly {
            bank,
            clock,
            out_in_ratio,
        });
    }

    if have_post {
        let fp = 1.0
            - (1.0
                - (1.0 - tbw0)
                    * if upsample {
                        factor * post_l as f64 / post_m as f64
                    } else {
                        1.0
                    })
                * tbw_tighten;
        stages.push(plan_dft_stage(
            ctx,
            fp,
            fs_a,
            post_l.max(post_m) as f64,
            att,
            phase,
            post_l as usize,
            post_m as usize,
        )?);
    }

    Ok(stages)
}
