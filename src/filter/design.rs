//! Windowed-sinc low-pass FIR design.
//!
//! The designer produces an ideal sinc response shaped by a Kaiser window
//! (beta derived from the attenuation target via piecewise closed-form
//! fits) or a Dolph-Chebyshev window for equal-ripple stop-bands. Tap
//! counts may be chosen automatically from the attenuation and transition
//! width, optionally rounded to a polyphase-branch multiple.

use std::f64::consts::PI;

use log::debug;

use crate::error::RateError;

/// Ceiling on automatically chosen tap counts.
const MAX_AUTO_TAPS: usize = 32767;

/// Zeroth-order modified Bessel function of the first kind, by series
/// expansion.
pub fn bessel_i0(x: f64) -> f64 {
    let mut term = 1.0;
    let mut sum = 1.0;
    let x2 = x / 2.0;
    let mut i = 1;
    loop {
        let y = x2 / i as f64;
        i += 1;
        term *= y * y;
        let last = sum;
        sum += term;
        if sum == last {
            return sum;
        }
    }
}

fn range_limit(x: i64, lo: i64, hi: i64) -> i64 {
    x.max(lo).min(hi)
}

/// Kaiser window beta for a stop-band attenuation (dB) and transition
/// bandwidth (fraction of Fc).
///
/// Above 60 dB the closed form under-performs, so a table of cubic fits
/// selected by transition width is interpolated instead. The fit constants
/// are calibrated, not derived; treat them as normative.
pub fn kaiser_beta(att: f64, tr_bw: f64) -> f64 {
    if att >= 60.0 {
        #[rustfmt::skip]
        const COEFS: [[f64; 4]; 10] = [
            [-6.784957e-10, 1.02856e-05,  0.1087556, -0.8988365 + 0.001],
            [-6.897885e-10, 1.027433e-05, 0.10876,   -0.8994658 + 0.002],
            [-1.000683e-09, 1.030092e-05, 0.1087677, -0.9007898 + 0.003],
            [-3.654474e-10, 1.040631e-05, 0.1087085, -0.8977766 + 0.006],
            [8.106988e-09,  6.983091e-06, 0.1091387, -0.9172048 + 0.015],
            [9.519571e-09,  7.272678e-06, 0.1090068, -0.9140768 + 0.025],
            [-5.626821e-09, 1.342186e-05, 0.1083999, -0.9065452 + 0.05],
            [-9.965946e-08, 5.073548e-05, 0.1040967, -0.7672778 + 0.085],
            [1.604808e-07,  -5.856462e-05, 0.1185998, -1.34824   + 0.1],
            [-1.511964e-07, 6.363034e-05, 0.1064627, -0.9876665 + 0.18],
        ];
        let realm = (tr_bw / 0.0005).ln() / 2f64.ln();
        let i0 = range_limit(realm as i64, 0, COEFS.len() as i64 - 1) as usize;
        let i1 = range_limit(1 + realm as i64, 0, COEFS.len() as i64 - 1) as usize;
        let eval = |c: &[f64; 4]| ((c[0] * att + c[1]) * att + c[2]) * att + c[3];
        let b0 = eval(&COEFS[i0]);
        let b1 = eval(&COEFS[i1]);
        return b0 + (b1 - b0) * (realm - realm.trunc());
    }
    if att > 50.0 {
        return 0.1102 * (att - 8.7);
    }
    if att > 20.96 {
        return 0.58417 * (att - 20.96).powf(0.4) + 0.07886 * (att - 20.96);
    }
    0.0
}

/// Estimates Kaiser beta (if negative) and tap count (if zero) for the
/// attenuation, cutoff, and transition width.
pub fn kaiser_params(att: f64, fc: f64, tr_bw: f64, beta: &mut f64, num_taps: &mut usize) {
    if *beta < 0.0 {
        *beta = kaiser_beta(att, tr_bw * 0.5 / fc);
    }
    let att = if att < 60.0 {
        (att - 7.95) / (2.285 * PI * 2.0)
    } else {
        ((0.0007528358 - 1.577737e-05 * *beta) * *beta + 0.6248022) * *beta + 0.06186902
    };
    if *num_taps == 0 {
        *num_taps = ((att / tr_bw + 1.0).ceil() as usize).min(MAX_AUTO_TAPS);
    }
}

/// Builds a Kaiser-windowed sinc low-pass.
///
/// `fc` is the cutoff as a fraction of Nyquist, `scale` a linear gain
/// (polyphase branch count), `rho` a window-edge tweak. Taps are
/// DC-normalized only when `dc_norm` is set.
pub fn make_lpf(num_taps: usize, fc: f64, beta: f64, rho: f64, scale: f64, dc_norm: bool) -> Vec<f64> {
    let m = num_taps - 1;
    let mut h = vec![0.0; num_taps];
    let mut sum = 0.0;
    let mult = scale / bessel_i0(beta);
    let mult1 = 1.0 / (0.5 * m as f64 + rho);
    debug!(
        "make_lpf(n={} Fc={:.7} beta={} rho={} dc-norm={} scale={})",
        num_taps, fc, beta, rho, dc_norm, scale
    );

    for i in 0..=m / 2 {
        let z = i as f64 - 0.5 * m as f64;
        let x = z * PI;
        let y = z * mult1;
        h[i] = if x != 0.0 { (fc * x).sin() / x } else { fc };
        h[i] *= bessel_i0(beta * (1.0 - y * y).sqrt()) * mult;
        sum += h[i];
        if m - i != i {
            h[m - i] = h[i];
            sum += h[i];
        }
    }
    if dc_norm {
        for t in h.iter_mut() {
            *t *= scale / sum;
        }
    }
    h
}

/// Applies a Dolph-Chebyshev window with the given stop-band attenuation
/// (dB) to `h` in place. Equal-ripple stop-band; sharper transition than
/// Kaiser at equal tap count.
pub fn apply_dolph(h: &mut [f64], att: f64) {
    let n = h.len();
    let edge = ((10f64.powf(att / 20.0)).acosh() / (n as f64 - 1.0)).cosh();
    let c = 1.0 - 1.0 / (edge * edge);
    let mut norm = 0.0;
    for i in (0..=(n - 1) / 2).rev() {
        let mut sum = if i == 0 { 1.0 } else { 0.0 };
        let mut b = 1.0;
        let mut t = 1.0;
        let mut j = 1usize;
        while j <= i && sum != t {
            t = sum;
            b *= c * (n - i - j) as f64 / j as f64;
            sum += b;
            b *= (i - j) as f64 / j as f64;
            j += 1;
        }
        sum /= (n - 1 - i) as f64;
        if norm == 0.0 {
            norm = sum;
        }
        sum /= norm;
        h[i] *= sum;
        h[n - 1 - i] *= sum;
    }
}

/// Window family for [`design_lpf`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    /// Kaiser window; beta derived from the attenuation unless given.
    Kaiser { beta: Option<f64> },
    /// Dolph-Chebyshev window at the given attenuation.
    Dolph,
}

impl Default for Window {
    fn default() -> Self {
        Window::Kaiser { beta: None }
    }
}

/// Tap-count constraint for [`design_lpf`]: either a polyphase branch
/// count the taps must divide into, or a modulus the count must satisfy.
#[derive(Debug, Clone, Copy)]
pub enum TapRounding {
    /// `num_taps / phases * phases + phases - 1` (polyphase banks).
    Phases(usize),
    /// `num_taps ≡ 1 (mod m)` (DFT-stage alignment).
    Multiple(usize),
}

/// Designs a low-pass FIR.
///
/// `fp`/`fs` are the pass-band and stop-band edges, `f_nyq` the Nyquist
/// reference they are expressed against, `att` the stop-band attenuation
/// in dB. `num_taps` of zero selects automatic estimation (clamped to
/// 32767 taps).
///
/// # Errors
/// Fails with [`RateError::CutoffAboveNyquist`] when the band edges leave
/// no realizable cutoff below Nyquist.
pub fn design_lpf(
    fp: f64,
    fs: f64,
    f_nyq: f64,
    att: f64,
    num_taps: usize,
    rounding: TapRounding,
    window: Window,
) -> Result<Vec<f64>, RateError> {
    let (n, fc, beta, rho, phases) = lpf_params(fp, fs, f_nyq, att, num_taps, rounding, window)?;
    let h = match window {
        Window::Kaiser { .. } => make_lpf(n, fc, beta, rho, phases as f64, false),
        Window::Dolph => {
            let mut h = make_lpf(n, fc, 0.0, rho, phases as f64, false);
            apply_dolph(&mut h, att);
            h
        }
    };
    Ok(h)
}

/// Estimates the tap count [`design_lpf`] would choose, without building
/// the filter.
pub fn lpf_tap_count(
    fp: f64,
    fs: f64,
    f_nyq: f64,
    att: f64,
    rounding: TapRounding,
) -> Result<usize, RateError> {
    let (n, ..) = lpf_params(fp, fs, f_nyq, att, 0, rounding, Window::default())?;
    Ok(n)
}

#[allow(clippy::type_complexity)]
fn lpf_params(
    fp: f64,
    fs: f64,
    f_nyq: f64,
    att: f64,
    num_taps: usize,
    rounding: TapRounding,
    window: Window,
) -> Result<(usize, f64, f64, f64, usize), RateError> {
    let (phases, modulo) = match rounding {
        TapRounding::Phases(p) => (p.max(1), 1),
        TapRounding::Multiple(m) => (1, m.max(1)),
    };
    let rho = if phases == 1 {
        0.5
    } else if att < 120.0 {
        0.63
    } else {
        0.75
    };
    // Normalize to Fn = 1.
    let fp = fp / f_nyq.abs();
    let mut fs = fs / f_nyq.abs();
    if fp <= 0.0 || fs <= fp || fp >= 1.0 {
        return Err(RateError::CutoffAboveNyquist {
            passband: fp,
            nyquist: 1.0,
        });
    }
    let mut tr_bw = 0.5 * (fs - fp); // 6 dB to stop point
    tr_bw /= phases as f64;
    fs /= phases as f64;
    tr_bw = tr_bw.min(0.5 * fs);
    let fc = fs - tr_bw;
    if fc - tr_bw < 0.0 {
        return Err(RateError::CutoffAboveNyquist {
            passband: fp,
            nyquist: 1.0,
        });
    }

    let mut beta = match window {
        Window::Kaiser { beta: Some(b) } => b,
        _ => -1.0,
    };
    let mut n = num_taps;
    kaiser_params(att, fc, tr_bw, &mut beta, &mut n);
    if num_taps == 0 {
        n = if phases > 1 {
            n / phases * phases + phases - 1
        } else {
            (n + modulo - 2) / modulo * modulo + 1
        };
        n = n.min(MAX_AUTO_TAPS);
    }
    Ok((n, fc, beta, rho, phases))
}
