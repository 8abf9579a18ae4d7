//! Orthonormal DCT-II and its inverse, computed through rustfft.

use rustfft::{num_complex::Complex64, FftPlanner};
use std::f64::consts::PI;

/// Orthonormal DCT-II.
///
/// `X_k = f_k · 2 Σ x_n cos(πk(2n+1) / 2N)` with `f_0 = √(1/4N)` and
/// `f_k = √(1/2N)` otherwise, computed from a `2N`-point FFT of the
/// mirrored signal.
pub fn dct_ortho(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = signal
        .iter()
        .chain(signal.iter().rev())
        .map(|&x| Complex64::new(x, 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(2 * n).process(&mut buffer);

    let n_f = n as f64;
    (0..n)
        .map(|k| {
            let twiddle = Complex64::from_polar(1.0, -PI * k as f64 / (2.0 * n_f));
            let scale = if k == 0 {
                (1.0 / (4.0 * n_f)).sqrt()
            } else {
                (1.0 / (2.0 * n_f)).sqrt()
            };
            (twiddle * buffer[k]).re * scale
        })
        .collect()
}

/// Inverse of [`dct_ortho`] (orthonormal DCT-III).
pub fn idct_ortho(coefficients: &[f64]) -> Vec<f64> {
    let n = coefficients.len();
    if n == 0 {
        return Vec::new();
    }

    let n_f = n as f64;
    let mut buffer = vec![Complex64::new(0.0, 0.0); 2 * n];
    for (k, &c) in coefficients.iter().enumerate() {
        let weight = if k == 0 {
            1.0 / n_f.sqrt()
        } else {
            1.0 / (2.0 * n_f).sqrt()
        };
        let z = Complex64::from_polar(weight * c, PI * k as f64 / (2.0 * n_f));
        buffer[k] = z;
        if k > 0 {
            buffer[2 * n - k] = z.conj();
        }
    }

    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(2 * n).process(&mut buffer);

    buffer[..n].iter().map(|z| z.re).collect()
}
