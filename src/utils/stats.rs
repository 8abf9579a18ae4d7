//! Statistical utility functions.

use statrs::distribution::{ContinuousCDF, Normal};
use std::cmp::Ordering;

/// Scale factor turning a median absolute deviation into a consistent
/// estimate of the standard deviation under normality.
pub const MAD_SCALE: f64 = 1.4826;

/// Quantile function of the standard normal distribution.
///
/// # Example
/// ```
/// use energy_analytics::utils::quantile_normal;
///
/// // 95% two-sided interval -> z ≈ 1.96
/// let z = quantile_normal(0.975);
/// assert!((z - 1.959964).abs() < 1e-5);
/// ```
pub fn quantile_normal(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    match Normal::new(0.0, 1.0) {
        Ok(standard) => standard.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the variance of a slice (sample variance with n-1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let sorted = sorted_copy(values);
    let n = sorted.len();
    if n.is_multiple_of(2) {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Median absolute deviation around the median (unscaled).
pub fn mad(values: &[f64]) -> f64 {
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in percent and clamped to `[0, 100]`.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let sorted = sorted_copy(values);
    let rank = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Variance below this fraction of the mean square counts as zero.
const RELATIVE_VARIANCE_FLOOR: f64 = 1e-24;

/// Pearson correlation of two equally long slices.
///
/// Returns `None` when fewer than two pairs are given or either side has
/// zero variance. The variance test is relative to each side's magnitude,
/// so tiny but varying values still correlate.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut qx = 0.0;
    let mut qy = 0.0;
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
        qx += a * a;
        qy += b * b;
    }

    if sxx <= RELATIVE_VARIANCE_FLOOR * qx || syy <= RELATIVE_VARIANCE_FLOOR * qy {
        return None;
    }
    let denom = (sxx * syy).sqrt();
    if !denom.is_finite() || denom == 0.0 {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantile_normal_known_values() {
        assert_relative_eq!(quantile_normal(0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(quantile_normal(0.975), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(quantile_normal(0.025), -1.959964, epsilon = 1e-5);
        assert_relative_eq!(quantile_normal(0.995), 2.575829, epsilon = 1e-5);
    }

    #[test]
    fn quantile_normal_boundary_values() {
        assert_eq!(quantile_normal(0.0), f64::NEG_INFINITY);
        assert_eq!(quantile_normal(1.0), f64::INFINITY);
    }

    #[test]
    fn mean_calculates_correctly() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0, epsilon = 1e-10);
        assert_relative_eq!(mean(&[10.0]), 10.0, epsilon = 1e-10);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn variance_calculates_correctly() {
        // Sample variance of [1, 2, 3, 4, 5] = 2.5
        assert_relative_eq!(variance(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2.5, epsilon = 1e-10);
        assert!(variance(&[1.0]).is_nan());
    }

    #[test]
    fn median_and_mad() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());

        // deviations from 3: [2, 1, 0, 1, 97] -> median 1
        assert_relative_eq!(mad(&[1.0, 2.0, 3.0, 4.0, 100.0]), 1.0);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&v, 0.0), 1.0);
        assert_relative_eq!(percentile(&v, 100.0), 5.0);
        assert_relative_eq!(percentile(&v, 50.0), 3.0);
        assert_relative_eq!(percentile(&v, 10.0), 1.4, epsilon = 1e-12);
    }

    #[test]
    fn pearson_perfect_and_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        let neg = [8.0, 6.0, 4.0, 2.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&x, &neg).unwrap(), -1.0, epsilon = 1e-12);
        assert!(pearson(&x, &[5.0; 4]).is_none());
        assert!(pearson(&[1.0], &[1.0]).is_none());
        assert!(pearson(&[0.1; 6], &x).is_none());
    }

    #[test]
    fn pearson_is_scale_free() {
        let x: Vec<f64> = (0..24).map(|i| (0.3 * i as f64).sin()).collect();
        let y: Vec<f64> = (0..24).map(|i| (0.3 * i as f64).sin() + 0.1 * (1.7 * i as f64).cos()).collect();
        let r = pearson(&x, &y).unwrap();

        let tiny_x: Vec<f64> = x.iter().map(|v| v * 1e-9).collect();
        let tiny_y: Vec<f64> = y.iter().map(|v| v * 1e-9).collect();
        assert_relative_eq!(pearson(&tiny_x, &tiny_y).unwrap(), r, epsilon = 1e-9);
        assert_relative_eq!(pearson(&x, &tiny_x).unwrap(), 1.0, epsilon = 1e-12);
    }
}
