//! Cached FFT transforms shared across stages and channels.
//!
//! Planned transforms (twiddle tables) are cached by length in a
//! readers–writer map: any number of concurrent stages may look up and run
//! transforms, and only the brief window in which a new length is planned
//! takes the exclusive lock. The cache only ever grows.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};

/// Process-scoped FFT table cache.
///
/// Create one per process (or per independent pipeline) and pass it by
/// `Arc` into every stage constructor; all channels of a conversion share
/// the same context.
pub struct FftContext {
    cache: RwLock<CacheInner>,
}

struct CacheInner {
    planner: FftPlanner<f64>,
    forward: HashMap<usize, Arc<dyn Fft<f64>>>,
    inverse: HashMap<usize, Arc<dyn Fft<f64>>>,
    max_len: usize,
}

impl FftContext {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(CacheInner {
                planner: FftPlanner::new(),
                forward: HashMap::new(),
                inverse: HashMap::new(),
                max_len: 0,
            }),
        }
    }

    /// Largest transform length planned so far.
    pub fn max_planned_len(&self) -> usize {
        self.cache.read().expect("fft cache poisoned").max_len
    }

    fn plan(&self, len: usize, direction: FftDirection) -> Arc<dyn Fft<f64>> {
        debug_assert!(len.is_power_of_two());
        {
            let cache = self.cache.read().expect("fft cache poisoned");
            let map = match direction {
                FftDirection::Forward => &cache.forward,
                FftDirection::Inverse => &cache.inverse,
            };
            if let Some(fft) = map.get(&len) {
                return Arc::clone(fft);
            }
        }
        let mut cache = self.cache.write().expect("fft cache poisoned");
        let fft = cache.planner.plan_fft(len, direction);
        let map = match direction {
            FftDirection::Forward => &mut cache.forward,
            FftDirection::Inverse => &mut cache.inverse,
        };
        let fft = Arc::clone(map.entry(len).or_insert(fft));
        cache.max_len = cache.max_len.max(len);
        fft
    }

    /// In-place forward FFT (unnormalized).
    pub fn forward(&self, buf: &mut [Complex<f64>]) {
        self.plan(buf.len(), FftDirection::Forward).process(buf);
    }

    /// In-place inverse FFT, scaled by 1/N so it is the true inverse of
    /// [`FftContext::forward`].
    pub fn inverse(&self, buf: &mut [Complex<f64>]) {
        let n = buf.len();
        self.plan(n, FftDirection::Inverse).process(buf);
        let scale = 1.0 / n as f64;
        for s in buf.iter_mut() {
            *s *= scale;
        }
    }

    /// Forward FFT of a real signal zero-padded to `len`, returned as a full
    /// complex spectrum.
    pub fn real_spectrum(&self, signal: &[f64], len: usize) -> Vec<Complex<f64>> {
        let mut buf = vec![Complex::new(0.0, 0.0); len];
        for (b, &s) in buf.iter_mut().zip(signal.iter()) {
            b.re = s;
        }
        self.forward(&mut buf);
        buf
    }
}

impl fmt::Debug for FftContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftContext")
            .field("max_planned_len", &self.max_planned_len())
            .finish()
    }
}

impl Default for FftContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_inverse_roundtrip() {
        let ctx = FftContext::new();
        let signal: Vec<f64> = (0..64).map(|i| ((i * 7) % 13) as f64 - 6.0).collect();
        let mut buf: Vec<Complex<f64>> =
            signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
        ctx.forward(&mut buf);
        ctx.inverse(&mut buf);
        for (a, b) in signal.iter().zip(buf.iter()) {
            assert!((a - b.re).abs() < 1e-12);
            assert!(b.im.abs() < 1e-12);
        }
    }

    #[test]
    fn cache_grows_monotonically() {
        let ctx = FftContext::new();
        let mut buf = vec![Complex::new(0.0, 0.0); 256];
        ctx.forward(&mut buf);
        assert_eq!(ctx.max_planned_len(), 256);
        let mut buf = vec![Complex::new(0.0, 0.0); 1024];
        ctx.forward(&mut buf);
        assert_eq!(ctx.max_planned_len(), 1024);
        // A shorter request never shrinks the cache.
        let mut buf = vec![Complex::new(0.0, 0.0); 512];
        ctx.forward(&mut buf);
        assert_eq!(ctx.max_planned_len(), 1024);
    }

    #[test]
    fn real_spectrum_dc() {
        let ctx = FftContext::new();
        let spec = ctx.real_spectrum(&[1.0; 16], 16);
        assert!((spec[0].re - 16.0).abs() < 1e-12);
        for bin in &spec[1..] {
            assert!(bin.norm() < 1e-9);
        }
    }
}
