mod common;

use common::{db, project_tone, rms, sine};
use rateconv::{convert, ConvertParams, QualityPreset};

#[test]
fn sine_44100_to_48000_medium() {
    let input = sine(1000.0, 44100.0, 44100, 0.9);
    let params = ConvertParams::new(44100.0, 48000.0)
        .unwrap()
        .with_preset(QualityPreset::Medium);
    let out = convert(&input, &params).unwrap();
    assert_eq!(out.len(), 48000);

    // 500 whole cycles from the settled interior: 1 kHz at 48 kHz is 48
    // samples per cycle.
    let interior = &out[9600..9600 + 24000];
    let (amplitude, residual) = project_tone(interior, 1000.0, 48000.0);
    let gain_db = db(amplitude / 0.9);
    assert!(gain_db.abs() < 0.1, "tone gain {} dB", gain_db);

    // Everything that is not the tone: aliases, images, numerical noise.
    let floor_db = db(residual / rms(interior));
    assert!(floor_db < -90.0, "alias floor {} dB", floor_db);
}

#[test]
fn tone_above_destination_nyquist_is_rejected() {
    // 13 kHz cannot be represented at 22.05 kHz; it must vanish, not fold.
    let input = sine(13000.0, 44100.0, 44100, 0.9);
    let params = ConvertParams::new(44100.0, 22050.0)
        .unwrap()
        .with_preset(QualityPreset::High);
    let out = convert(&input, &params).unwrap();
    assert_eq!(out.len(), 22050);
    let interior = &out[4000..18000];
    let level_db = db(rms(interior) / (0.9 / 2f64.sqrt()));
    assert!(level_db < -90.0, "leaked {} dB", level_db);
}

#[test]
fn round_trip_preserves_the_tone() {
    let input = sine(1000.0, 44100.0, 44100, 0.5);
    let up = ConvertParams::new(44100.0, 48000.0)
        .unwrap()
        .with_preset(QualityPreset::High);
    let down = ConvertParams::new(48000.0, 44100.0)
        .unwrap()
        .with_preset(QualityPreset::High);
    let out = convert(&convert(&input, &up).unwrap(), &down).unwrap();
    assert_eq!(out.len(), 44100);

    // 100 whole cycles at 44.1 samples per cycle.
    let interior = &out[8820..8820 + 4410];
    let (amplitude, residual) = project_tone(interior, 1000.0, 44100.0);
    let gain_db = db(amplitude / 0.5);
    assert!(gain_db.abs() < 0.1, "round-trip gain {} dB", gain_db);
    let floor_db = db(residual / rms(interior));
    assert!(floor_db < -80.0, "round-trip floor {} dB", floor_db);
}

#[test]
fn emitted_counts_are_exact() {
    for &(fin, fout) in &[
        (44100.0, 48000.0),
        (48000.0, 44100.0),
        (44100.0, 22050.0),
        (22050.0, 96000.0),
        (44100.0, 44100.0 * std::f64::consts::SQRT_2),
    ] {
        for &n in &[977usize, 10000, 44100] {
            let params = ConvertParams::new(fin, fout).unwrap();
            let out = convert(&vec![0.25; n], &params).unwrap();
            let expect = (n as f64 * fout / fin + 0.5) as usize;
            assert_eq!(out.len(), expect, "{} -> {}, {} in", fin, fout, n);
        }
    }
}

#[test]
fn all_presets_convert_a_sine() {
    let input = sine(440.0, 44100.0, 22050, 0.5);
    for &preset in &[
        QualityPreset::Quick,
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
        QualityPreset::VeryHigh,
    ] {
        let params = ConvertParams::new(44100.0, 48000.0)
            .unwrap()
            .with_preset(preset);
        let out = convert(&input, &params).unwrap();
        assert_eq!(out.len(), 24000, "{:?}", preset);
        assert!(out.iter().all(|s| s.is_finite()), "{:?}", preset);
        let peak = out[4000..20000].iter().fold(0.0f64, |p, &s| p.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "{:?}: peak {}", preset, peak);
    }
}

#[test]
fn minimum_phase_output_matches_linear_in_magnitude() {
    let input = sine(1000.0, 44100.0, 44100, 0.5);
    let linear = ConvertParams::new(44100.0, 48000.0).unwrap();
    let minimum = ConvertParams::new(44100.0, 48000.0).unwrap().minimum_phase();
    let out_lin = convert(&input, &linear).unwrap();
    let out_min = convert(&input, &minimum).unwrap();
    assert_eq!(out_lin.len(), out_min.len());
    let (a_lin, _) = project_tone(&out_lin[9600..9600 + 24000], 1000.0, 48000.0);
    let (a_min, _) = project_tone(&out_min[9600..9600 + 24000], 1000.0, 48000.0);
    assert!(db(a_min / a_lin).abs() < 0.1);
}

#[test]
fn irrational_ratio_holds_its_pitch() {
    // Rate chosen so no rational approximation is found; the stage runs on
    // the 64.64 clock.
    let out_rate = 44100.0 * std::f64::consts::SQRT_2;
    let input = sine(1000.0, 44100.0, 88200, 0.5);
    let params = ConvertParams::new(44100.0, out_rate).unwrap();
    let out = convert(&input, &params).unwrap();
    // The tone must sit at 1 kHz of the new rate; project over an interior
    // window and check both level and purity.
    let start = out.len() / 4;
    let window = &out[start..start + 31219]; // ~500.5 cycles; leakage is tiny
    let (amplitude, residual) = project_tone(window, 1000.0, out_rate);
    assert!(db(amplitude / 0.5).abs() < 0.2, "gain {}", db(amplitude / 0.5));
    assert!(db(residual / rms(window)) < -55.0);
}
