//! Phase-response reshaping of linear-phase FIR filters.
//!
//! A linear-phase design is converted to an arbitrary phase response
//! (0 % = minimum phase … 50 % = linear … 100 % = maximum phase) by
//! moving to log-magnitude/unwrapped-phase in the frequency domain,
//! blending the measured minimum-phase trajectory against the
//! linear-phase trajectory, inverse-transforming, and re-windowing the
//! taps around the relocated energy peak.

use std::f64::consts::PI;

use log::debug;
use rustfft::num_complex::Complex;

use crate::fft::FftContext;

// Stands in for log(0) in the log-magnitude spectrum.
fn safe_log(x: f64) -> f64 {
    debug_assert!(x >= 0.0);
    if x > 0.0 {
        x.ln()
    } else {
        -26.0
    }
}

/// Reshapes `taps` to the requested phase response percentage.
///
/// Returns the (possibly re-windowed) taps and the new post-peak index.
pub fn fir_to_phase(ctx: &FftContext, taps: Vec<f64>, phase_pc: f64) -> (Vec<f64>, usize) {
    let mut len = taps.len();
    let phase1 = (if phase_pc > 50.0 {
        100.0 - phase_pc
    } else {
        phase_pc
    }) / 50.0;

    // Work length: 32 doubled once per octave of filter length.
    let mut work_len = 2 * 2 * 8;
    let mut i = len;
    while i > 1 {
        work_len <<= 1;
        i >>= 1;
    }
    let half = work_len / 2;

    let mut work: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); work_len];
    for (w, &t) in work.iter_mut().zip(taps.iter()) {
        w.re = t;
    }
    ctx.forward(&mut work);

    // Log-magnitude spectrum plus the cumulative pi-wrap count of the
    // unwrapped phase, which measures the filter's total group delay.
    let mut pi_wraps = vec![0.0f64; half + 1];
    let (mut prev_angle2, mut cum_2pi) = (0.0f64, 0.0f64);
    let (mut prev_angle1, mut cum_1pi) = (0.0f64, 0.0f64);
    for k in 0..=half {
        let bin = work[k];
        let mut angle = bin.im.atan2(bin.re);
        let detect = 2.0 * PI;
        let delta = angle - prev_angle2;
        let adjust =
            detect * (((delta < -detect * 0.7) as i32 - (delta > detect * 0.7) as i32) as f64);
        prev_angle2 = angle;
        cum_2pi += adjust;
        angle += cum_2pi;
        let detect = PI;
        let delta = angle - prev_angle1;
        let adjust =
            detect * (((delta < -detect * 0.7) as i32 - (delta > detect * 0.7) as i32) as f64);
        prev_angle1 = angle;
        cum_1pi += adjust.abs(); // abs for when 2pi and 1pi have combined
        pi_wraps[k] = cum_1pi;

        work[k] = Complex::new(safe_log(bin.norm()), 0.0);
    }
    for k in half + 1..work_len {
        work[k] = work[work_len - k];
    }

    // Real cepstrum; fold to reject acausal components, i.e. derive the
    // minimum-phase counterpart.
    ctx.inverse(&mut work);
    for k in 1..half {
        work[k].re *= 2.0;
        work[k].im = 0.0;
        work[k + half] = Complex::new(0.0, 0.0);
    }
    work[0].im = 0.0;
    work[half].im = 0.0;
    ctx.forward(&mut work);

    // Interpolate between linear and minimum phase.
    for k in 1..half {
        work[k].im = phase1 * (2 * k) as f64 / work_len as f64 * pi_wraps[half]
            + (1.0 - phase1) * (work[k].im + pi_wraps[k])
            - pi_wraps[k];
    }
    work[0] = Complex::new(work[0].re.exp(), 0.0);
    work[half] = Complex::new(work[half].re.exp(), 0.0);
    for k in 1..half {
        let mag = work[k].re.exp();
        work[k] = Complex::new(mag * work[k].im.cos(), mag * work[k].im.sin());
    }
    for k in half + 1..work_len {
        work[k] = work[work_len - k].conj();
    }
    ctx.inverse(&mut work);

    // Find the cumulative-energy peak of the reshaped impulse.
    let mut peak = 0usize;
    let mut imp_sum = 0.0f64;
    let mut peak_imp_sum = 0.0f64;
    let limit = ((pi_wraps[half] / PI + 0.5) as usize).min(work_len - 1);
    for (i, w) in work.iter().enumerate().take(limit + 1) {
        imp_sum += w.re;
        if imp_sum.abs() > peak_imp_sum.abs() {
            peak_imp_sum = imp_sum;
            peak = i;
        }
    }
    while peak > 0
        && work[peak - 1].re.abs() > work[peak].re.abs()
        && work[peak - 1].re * work[peak].re > 0.0
    {
        peak -= 1;
    }

    let begin: isize;
    if phase1 == 0.0 {
        begin = 0;
    } else if phase1 == 1.0 {
        begin = peak as isize - (len / 2) as isize;
    } else {
        let b = ((0.997 - (2.0 - phase1) * 0.22) * len as f64 + 0.5) as isize;
        let e = ((0.997 - phase1 * 0.22) * len as f64 + 0.5) as isize;
        begin = peak as isize - (b & !3);
        let end = peak as isize + 1 + ((e + 3) & !3);
        len = (end - begin) as usize;
    }

    let mut h = vec![0.0f64; len];
    let mask = (work_len - 1) as isize;
    for (i, t) in h.iter_mut().enumerate() {
        let src = if phase_pc > 50.0 { len - 1 - i } else { i } as isize;
        *t = work[((begin + src + work_len as isize) & mask) as usize].re;
    }
    let post_peak = if phase_pc > 50.0 {
        (peak as isize - begin).max(0) as usize
    } else {
        (begin + len as isize - (peak as isize + 1)).max(0) as usize
    };

    debug!(
        "n_pi={:.3} peak={} len={} post_peak={} ({:.1}%)",
        pi_wraps[half] / PI,
        peak,
        len,
        post_peak,
        100.0 - 100.0 * post_peak as f64 / (len as f64 - 1.0)
    );
    (h, post_peak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::{design_lpf, TapRounding, Window};

    fn test_filter() -> Vec<f64> {
        design_lpf(
            0.4,
            0.5,
            1.0,
            100.0,
            0,
            TapRounding::Multiple(1),
            Window::default(),
        )
        .unwrap()
    }

    fn magnitude_at(h: &[f64], f: f64) -> f64 {
        let (mut re, mut im) = (0.0, 0.0);
        for (i, &t) in h.iter().enumerate() {
            let w = PI * f * i as f64;
            re += t * w.cos();
            im -= t * w.sin();
        }
        (re * re + im * im).sqrt()
    }

    #[test]
    fn minimum_phase_preserves_magnitude() {
        let ctx = FftContext::new();
        let lin = test_filter();
        let (min, post_peak) = fir_to_phase(&ctx, lin.clone(), 0.0);
        // Energy front-loaded: peak is near the start.
        assert!(post_peak > min.len() / 2, "post_peak {} of {}", post_peak, min.len());
        for &f in &[0.0, 0.1, 0.2, 0.3] {
            let a = magnitude_at(&lin, f);
            let b = magnitude_at(&min, f);
            assert!(
                (20.0 * (b / a).log10()).abs() < 0.1,
                "pass-band deviation at {}: {} vs {}",
                f,
                a,
                b
            );
        }
        let stop = magnitude_at(&min, 0.8) / magnitude_at(&min, 0.0);
        assert!(20.0 * stop.log10() < -80.0);
    }

    #[test]
    fn maximum_phase_mirrors_minimum() {
        let ctx = FftContext::new();
        let lin = test_filter();
        let (min, min_pp) = fir_to_phase(&ctx, lin.clone(), 0.0);
        let (max, max_pp) = fir_to_phase(&ctx, lin, 100.0);
        assert_eq!(min.len(), max.len());
        // Time-reversed pair with complementary peak positions.
        for (a, b) in min.iter().zip(max.iter().rev()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(min_pp + max_pp, min.len() - 1);
    }

    #[test]
    fn intermediate_phase_runs() {
        let ctx = FftContext::new();
        let lin = test_filter();
        let (h, post_peak) = fir_to_phase(&ctx, lin, 25.0);
        assert!(!h.is_empty());
        assert!(post_peak < h.len());
        assert!(h.iter().all(|t| t.is_finite()));
    }
}
