//! Differencing and lag-polynomial helpers for seasonal ARIMA models.
//!
//! Lag polynomials are stored as coefficient vectors indexed by power of the
//! backshift operator `B`, so `[1.0, -0.5]` is `1 − 0.5·B`.

/// Apply `d` rounds of first differencing.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Apply `d` rounds of lag-`period` differencing.
pub fn seasonal_difference(series: &[f64], d: usize, period: usize) -> Vec<f64> {
    if period == 0 {
        return series.to_vec();
    }
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= period {
            return Vec::new();
        }
        result = result
            .iter()
            .skip(period)
            .zip(result.iter())
            .map(|(curr, prev)| curr - prev)
            .collect();
    }
    result
}

/// Product of two lag polynomials.
pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        if *x == 0.0 {
            continue;
        }
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign · Σ coefficients[i] · B^((i + 1) · stride)`.
///
/// With `sign = -1` this builds an autoregressive polynomial, with `sign = 1`
/// a moving-average one.
pub fn lag_polynomial(coefficients: &[f64], stride: usize, sign: f64) -> Vec<f64> {
    let stride = stride.max(1);
    let mut poly = vec![0.0; coefficients.len() * stride + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * stride] = sign * c;
    }
    poly
}

/// `(1 − B)^d · (1 − B^period)^seasonal_d`.
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        let seasonal = lag_polynomial(&[1.0], period, -1.0);
        for _ in 0..seasonal_d {
            poly = poly_mul(&poly, &seasonal);
        }
    }
    poly
}

/// Coefficients `ψ_0 … ψ_{horizon−1}` of the infinite moving-average form
/// `ma(B) / ar(B)`, both polynomials with a leading 1.
pub fn psi_weights(ar: &[f64], ma: &[f64], horizon: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(horizon);
    for j in 0..horizon {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut value = ma.get(j).copied().unwrap_or(0.0);
        for i in 1..=j.min(ar.len().saturating_sub(1)) {
            value -= ar[i] * psi[j - i];
        }
        psi.push(value);
    }
    psi
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn difference_order_2() {
        let series = vec![1.0, 3.0, 6.0, 10.0, 15.0];
        assert_eq!(difference(&series, 1), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&series, 2), vec![1.0, 1.0, 1.0]);
        assert_eq!(difference(&series, 0), series);
        assert!(difference(&[1.0], 1).is_empty());
    }

    #[test]
    fn seasonal_difference_removes_repeating_pattern() {
        let series = vec![100.0, 120.0, 80.0, 90.0, 110.0, 130.0, 90.0, 100.0];
        assert_eq!(seasonal_difference(&series, 1, 4), vec![10.0; 4]);
        assert!(seasonal_difference(&series, 2, 4).is_empty());
    }

    #[test]
    fn seasonal_ar_polynomial_multiplies_out() {
        // (1 − 0.5B)(1 − 0.3B^4)
        let ar = poly_mul(&lag_polynomial(&[0.5], 1, -1.0), &lag_polynomial(&[0.3], 4, -1.0));
        assert_eq!(ar.len(), 6);
        assert_relative_eq!(ar[0], 1.0);
        assert_relative_eq!(ar[1], -0.5);
        assert_relative_eq!(ar[4], -0.3);
        assert_relative_eq!(ar[5], 0.15);
        assert_relative_eq!(ar[2] + ar[3], 0.0);
    }

    #[test]
    fn differencing_polynomial_matches_difference() {
        let series: Vec<f64> = (0..30).map(|i| (i * i) as f64 + (i % 7) as f64).collect();
        let poly = differencing_polynomial(1, 1, 7);
        let expected = seasonal_difference(&difference(&series, 1), 1, 7);

        let r = poly.len() - 1;
        for t in r..series.len() {
            let applied: f64 = poly.iter().enumerate().map(|(i, c)| c * series[t - i]).sum();
            assert_relative_eq!(applied, expected[t - r], epsilon = 1e-9);
        }
    }

    #[test]
    fn random_walk_psi_weights_are_ones() {
        let psi = psi_weights(&[1.0, -1.0], &[1.0], 5);
        assert_eq!(psi, vec![1.0; 5]);
    }

    #[test]
    fn ar1_psi_weights_decay_geometrically() {
        let psi = psi_weights(&[1.0, -0.6], &[1.0, 0.2], 4);
        assert_relative_eq!(psi[1], 0.8);
        assert_relative_eq!(psi[2], 0.48, epsilon = 1e-12);
        assert_relative_eq!(psi[3], 0.288, epsilon = 1e-12);
    }
}
