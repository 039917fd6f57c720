//! Concurrent use of the shared FFT table cache.

use std::sync::Arc;
use std::thread;

use rateconv::{ConvertParams, FftContext, QualityPreset, Resampler};

#[test]
fn cache_is_safe_under_concurrent_planning() {
    let ctx = Arc::new(FftContext::new());

    // Several threads plan and run overlapping transform lengths at once.
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                for &len in &[256usize, 1024, 512] {
                    let signal: Vec<f64> = (0..len)
                        .map(|i| ((i * (t + 3)) % 17) as f64 - 8.0)
                        .collect();
                    let mut buf = ctx.real_spectrum(&signal, len);
                    ctx.inverse(&mut buf);
                    for (a, b) in signal.iter().zip(buf.iter()) {
                        assert!((a - b.re).abs() < 1e-9);
                        assert!(b.im.abs() < 1e-9);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // All lengths were planned; a later short request never evicts them.
    assert_eq!(ctx.max_planned_len(), 1024);
    let mut buf = ctx.real_spectrum(&[1.0; 256], 256);
    ctx.inverse(&mut buf);
    assert_eq!(ctx.max_planned_len(), 1024);
}

#[test]
fn resamplers_share_one_context_across_threads() {
    let ctx = Arc::new(FftContext::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let params = ConvertParams::new(44100.0, 48000.0)
                    .unwrap()
                    .with_preset(QualityPreset::Medium);
                let mut r = Resampler::with_context(&params, ctx).unwrap();
                let mut out = r.process(&vec![0.5; 4410]).unwrap();
                out.extend(r.flush());
                out
            })
        })
        .collect();
    let results: Vec<Vec<f64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for r in &results[1..] {
        assert_eq!(r, &results[0]);
    }
    assert!(ctx.max_planned_len() >= 1024);
}
