//! Tabulated half-band FIR kernels for the power-of-two decimation stages.
//!
//! Each kernel holds one side of a symmetric odd-length filter whose centre
//! tap is exactly 0.5 and whose even taps (other than the centre) are zero,
//! so a factor-2 decimator costs only `num_coefs` multiplies per output
//! sample. The `att` figure is the measured stop-band rejection in dB.

/// One side of a symmetric half-band filter.
#[derive(Debug, Clone, Copy)]
pub struct HalfBandFir {
    /// Odd-index taps on one side of the centre.
    pub coefs: &'static [f64],
    /// Stop-band rejection, dB.
    pub att: f64,
}

const HALF_FIR_COEFS_8: [f64; 8] = [
    0.3115465451887802,
    -0.08734497241282892,
    0.03681452335604365,
    -0.01518925831569441,
    0.005454118437408876,
    -0.001564400922162005,
    0.0003181701445034203,
    -3.48001341225749e-5,
];

const HALF_FIR_COEFS_9: [f64; 9] = [
    0.3122703613711853,
    -0.08922155288172305,
    0.03913974805854332,
    -0.01725059723447163,
    0.006858970092378141,
    -0.002304518467568703,
    0.0006096426006051062,
    -0.0001132393923815236,
    1.119795386287666e-5,
];

const HALF_FIR_COEFS_10: [f64; 10] = [
    0.3128545521327376,
    -0.09075671986104322,
    0.04109637155154835,
    -0.01906629512749895,
    0.008184039342054333,
    -0.0030766775017262,
    0.0009639607022414314,
    -0.0002358552746579827,
    4.025184282444155e-5,
    -3.629779111541012e-6,
];

const HALF_FIR_COEFS_11: [f64; 11] = [
    0.3133358837508807,
    -0.09203588680609488,
    0.04276515428384758,
    -0.02067356614745591,
    0.00942253142371517,
    -0.003856330993895144,
    0.001363470684892284,
    -0.0003987400965541919,
    9.058629923971627e-5,
    -1.428553070915318e-5,
    1.183455238783835e-6,
];

const HALF_FIR_COEFS_12: [f64; 12] = [
    0.3137392991811407,
    -0.0931182192961332,
    0.0442050575271454,
    -0.02210391200618091,
    0.01057473015666001,
    -0.00462766983973885,
    0.001793630226239453,
    -0.0005961819959665878,
    0.0001631475979359577,
    -3.45557865639653e-5,
    5.06188341942088e-6,
    -3.877010943315563e-7,
];

const HALF_FIR_COEFS_13: [f64; 13] = [
    0.3140822554324578,
    -0.0940458550886253,
    0.04545990399121566,
    -0.02338339450796002,
    0.01164429409071052,
    -0.005380686021429845,
    0.002242915773871009,
    -0.000822047600000082,
    0.0002572510962395222,
    -6.607320708956279e-5,
    1.309926399120154e-5,
    -1.790719575255006e-6,
    1.27504961098836e-7,
];

/// Available kernels, in increasing rejection order.
pub const HALF_FIRS: [HalfBandFir; 6] = [
    HalfBandFir {
        coefs: &HALF_FIR_COEFS_8,
        att: 136.51,
    },
    HalfBandFir {
        coefs: &HALF_FIR_COEFS_9,
        att: 152.32,
    },
    HalfBandFir {
        coefs: &HALF_FIR_COEFS_10,
        att: 168.07,
    },
    HalfBandFir {
        coefs: &HALF_FIR_COEFS_11,
        att: 183.78,
    },
    HalfBandFir {
        coefs: &HALF_FIR_COEFS_12,
        att: 199.44,
    },
    HalfBandFir {
        coefs: &HALF_FIR_COEFS_13,
        att: 212.75,
    },
];

/// The cheapest kernel meeting the given rejection requirement.
pub fn select_half_fir(att: f64) -> &'static HalfBandFir {
    HALF_FIRS
        .iter()
        .find(|h| att <= h.att)
        .unwrap_or(&HALF_FIRS[HALF_FIRS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_have_unity_dc_gain() {
        for fir in &HALF_FIRS {
            let gain = 0.5 + 2.0 * fir.coefs.iter().sum::<f64>();
            // The tables are quantized prints of the designed kernels; the
            // 8-tap one carries ~1.5e-7 of residual DC error.
            assert!(
                (gain - 1.0).abs() < 1e-6,
                "dc gain {} for {}-tap kernel",
                gain,
                fir.coefs.len()
            );
        }
    }

    #[test]
    fn quarter_band_gain_is_half() {
        // The side taps sit on zero crossings of the quarter-band cosine,
        // leaving only the centre tap: every half-band filter passes
        // exactly 0.5 at fs/4.
        for fir in &HALF_FIRS {
            let mut gain = 0.5;
            for (j, &c) in fir.coefs.iter().enumerate() {
                let k = (2 * j + 1) as f64;
                gain += 2.0 * c * (std::f64::consts::PI * k * 0.5).cos();
            }
            assert!((gain - 0.5).abs() < 1e-7);
        }
    }

    #[test]
    fn selection_is_cheapest_sufficient() {
        assert_eq!(select_half_fir(100.0).coefs.len(), 8);
        assert_eq!(select_half_fir(136.51).coefs.len(), 8);
        assert_eq!(select_half_fir(140.0).coefs.len(), 9);
        assert_eq!(select_half_fir(200.0).coefs.len(), 13);
        assert_eq!(select_half_fir(500.0).coefs.len(), 13);
    }
}
