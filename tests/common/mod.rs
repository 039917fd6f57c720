//! Shared helpers for integration tests.

use std::f64::consts::TAU;

/// Generates a sine wave of `freq` Hz at `rate` Hz.
pub fn sine(freq: f64, rate: f64, len: usize, amplitude: f64) -> Vec<f64> {
    (0..len)
        .map(|i| amplitude * (TAU * freq * i as f64 / rate).sin())
        .collect()
}

/// Root-mean-square level of a signal.
pub fn rms(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|s| s * s).sum::<f64>() / signal.len() as f64).sqrt()
}

pub fn db(ratio: f64) -> f64 {
    20.0 * ratio.log10()
}

/// Least-squares fit of a `freq` Hz tone over `signal`, which should span a
/// whole number of cycles. Returns the tone amplitude and the RMS of the
/// residual once the tone is subtracted.
pub fn project_tone(signal: &[f64], freq: f64, rate: f64) -> (f64, f64) {
    let n = signal.len() as f64;
    let (mut a, mut b) = (0.0, 0.0);
    for (i, &s) in signal.iter().enumerate() {
        let w = TAU * freq * i as f64 / rate;
        a += s * w.sin();
        b += s * w.cos();
    }
    a *= 2.0 / n;
    b *= 2.0 / n;
    let amplitude = (a * a + b * b).sqrt();
    let residual: Vec<f64> = signal
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = TAU * freq * i as f64 / rate;
            s - a * w.sin() - b * w.cos()
        })
        .collect();
    (amplitude, rms(&residual))
}
