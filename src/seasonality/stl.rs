//! STL (Seasonal-Trend decomposition using LOESS) implementation.
//!
//! Follows Cleveland et al. (1990): an inner loop alternates cycle-subseries
//! smoothing and trend smoothing, and an optional outer loop recomputes
//! bisquare robustness weights from the remainder so that transient spikes
//! do not leak into the trend or seasonal estimates.
//!
//! All smoothers are local-linear LOESS with a tricube kernel.

use crate::core::TimeSeries;
use crate::error::{AnalysisError, Result};
use crate::utils::stats::{median, variance};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trend, seasonal and residual components of one series.
///
/// `trend + seasonal + residual` reproduces `observed` point by point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub observed: TimeSeries,
    pub trend: TimeSeries,
    pub seasonal: TimeSeries,
    pub residual: TimeSeries,
}

impl Decomposition {
    /// Seasonal strength in `[0, 1]`; values close to 1 indicate strong
    /// seasonality.
    pub fn seasonal_strength(&self) -> f64 {
        strength(self.seasonal.values(), self.residual.values())
    }

    /// Trend strength in `[0, 1]`.
    pub fn trend_strength(&self) -> f64 {
        strength(self.trend.values(), self.residual.values())
    }

    /// Observed minus seasonal.
    pub fn seasonally_adjusted(&self) -> Result<TimeSeries> {
        let adjusted = self
            .observed
            .values()
            .iter()
            .zip(self.seasonal.values())
            .map(|(y, s)| y - s)
            .collect();
        self.observed.with_values(adjusted)
    }
}

fn strength(component: &[f64], remainder: &[f64]) -> f64 {
    let combined: Vec<f64> = component.iter().zip(remainder).map(|(c, r)| c + r).collect();
    let var_combined = variance(&combined);
    if !(var_combined > 1e-10) {
        return 0.0;
    }
    (1.0 - variance(remainder) / var_combined).clamp(0.0, 1.0)
}

/// Raw component vectors from [`Stl::decompose_values`].
#[derive(Debug, Clone, PartialEq)]
pub struct StlComponents {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

fn next_odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// STL decomposition configuration and algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stl {
    /// Samples per seasonal cycle.
    period: usize,
    /// LOESS span of the cycle-subseries smoother (odd).
    seasonal_window: usize,
    /// LOESS span of the trend smoother; derived from the period when unset.
    trend_window: Option<usize>,
    /// LOESS span of the low-pass filter; derived from the period when unset.
    low_pass_window: Option<usize>,
    inner_iterations: Option<usize>,
    outer_iterations: Option<usize>,
    robust: bool,
}

impl Stl {
    /// Create a decomposer for the given period with a seasonal span of 7.
    pub fn new(period: usize) -> Self {
        Self {
            period,
            seasonal_window: 7,
            trend_window: None,
            low_pass_window: None,
            inner_iterations: None,
            outer_iterations: None,
            robust: false,
        }
    }

    /// Set the seasonal span. Even values are rounded up to the next odd one.
    pub fn with_seasonal_window(mut self, window: usize) -> Self {
        self.seasonal_window = next_odd(window);
        self
    }

    /// Set the trend span. Even values are rounded up to the next odd one.
    pub fn with_trend_window(mut self, window: usize) -> Self {
        self.trend_window = Some(next_odd(window));
        self
    }

    /// Set the low-pass span. Even values are rounded up to the next odd one.
    pub fn with_low_pass_window(mut self, window: usize) -> Self {
        self.low_pass_window = Some(next_odd(window));
        self
    }

    /// Enable or disable robustness iterations.
    pub fn robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    pub fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = Some(n.max(1));
        self
    }

    pub fn with_outer_iterations(mut self, n: usize) -> Self {
        self.outer_iterations = Some(n);
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn seasonal_window(&self) -> usize {
        self.seasonal_window
    }

    pub fn is_robust(&self) -> bool {
        self.robust
    }

    /// Trend span in effect: the configured one, or the smallest odd integer
    /// not below `1.5 · period / (1 − 1.5 / seasonal_window)`.
    pub fn trend_window(&self) -> usize {
        self.trend_window.unwrap_or_else(|| {
            let ns = self.seasonal_window as f64;
            let nt = (1.5 * self.period as f64 / (1.0 - 1.5 / ns)).ceil() as usize;
            next_odd(nt.max(3))
        })
    }

    /// Low-pass span in effect: the smallest odd integer above the period.
    pub fn low_pass_window(&self) -> usize {
        self.low_pass_window
            .unwrap_or_else(|| next_odd(self.period + 1))
    }

    fn iterations(&self) -> (usize, usize) {
        let (inner, outer) = if self.robust { (2, 15) } else { (5, 0) };
        (
            self.inner_iterations.unwrap_or(inner),
            self.outer_iterations.unwrap_or(outer),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.period < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "period must be at least 2, got {}",
                self.period
            )));
        }
        if self.seasonal_window < 3 {
            return Err(AnalysisError::InvalidParameter(format!(
                "seasonal window must be at least 3, got {}",
                self.seasonal_window
            )));
        }
        if self.trend_window() <= self.period {
            return Err(AnalysisError::InvalidParameter(format!(
                "trend window {} must exceed the period {}",
                self.trend_window(),
                self.period
            )));
        }
        if self.low_pass_window() <= self.period {
            return Err(AnalysisError::InvalidParameter(format!(
                "low-pass window {} must exceed the period {}",
                self.low_pass_window(),
                self.period
            )));
        }
        Ok(())
    }

    /// Decompose a series into trend, seasonal and residual components.
    ///
    /// Fails with [`AnalysisError::InsufficientData`] if the series is shorter
    /// than two periods and with [`AnalysisError::MissingValues`] if it still
    /// contains NaN.
    pub fn decompose(&self, series: &TimeSeries) -> Result<Decomposition> {
        let parts = self.decompose_values(series.values())?;
        Ok(Decomposition {
            observed: series.clone(),
            trend: series.with_values(parts.trend)?.with_label("trend"),
            seasonal: series.with_values(parts.seasonal)?.with_label("seasonal"),
            residual: series.with_values(parts.remainder)?.with_label("residual"),
        })
    }

    /// Decompose raw values.
    pub fn decompose_values(&self, y: &[f64]) -> Result<StlComponents> {
        self.validate()?;
        let n = y.len();
        if n < 2 * self.period {
            return Err(AnalysisError::InsufficientData {
                needed: 2 * self.period,
                got: n,
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::MissingValues);
        }

        let (inner, outer) = self.iterations();
        let trend_window = self.trend_window();
        let low_pass_window = self.low_pass_window();
        debug!(
            n,
            period = self.period,
            seasonal = self.seasonal_window,
            trend = trend_window,
            robust = self.robust,
            "stl decomposition"
        );

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights = vec![1.0; n];

        for pass in 0..=outer {
            for _ in 0..inner {
                let detrended: Vec<f64> = y.iter().zip(&trend).map(|(v, t)| v - t).collect();

                let cycle = self.smooth_cycle_subseries(&detrended, &weights);
                let low_pass = low_pass_filter(&cycle, self.period, low_pass_window);
                for i in 0..n {
                    seasonal[i] = cycle[i + self.period] - low_pass[i];
                }

                let deseasonalized: Vec<f64> = y.iter().zip(&seasonal).map(|(v, s)| v - s).collect();
                trend = loess_smooth(&deseasonalized, &weights, trend_window);
            }

            if pass < outer {
                let remainder: Vec<f64> = (0..n).map(|i| y[i] - trend[i] - seasonal[i]).collect();
                weights = robustness_weights(&remainder, y);
            }
        }

        let remainder = (0..n).map(|i| y[i] - trend[i] - seasonal[i]).collect();
        Ok(StlComponents {
            trend,
            seasonal,
            remainder,
        })
    }

    /// Smooth each cycle-subseries and extend it by one cycle on each side.
    ///
    /// The result has `n + 2 · period` points; index `i + period` lines up
    /// with input index `i`.
    fn smooth_cycle_subseries(&self, detrended: &[f64], weights: &[f64]) -> Vec<f64> {
        let n = detrended.len();
        let period = self.period;
        let mut out = vec![0.0; n + 2 * period];

        for pos in 0..period {
            let values: Vec<f64> = detrended.iter().skip(pos).step_by(period).copied().collect();
            let rho: Vec<f64> = weights.iter().skip(pos).step_by(period).copied().collect();
            let m = values.len();

            // Evaluate at -1, 0, ..., m: one extra point on each side.
            for k in 0..m + 2 {
                let x = k as f64 - 1.0;
                let nearest = k.saturating_sub(1).min(m - 1);
                let fitted = loess_at(&values, &rho, x, self.seasonal_window)
                    .unwrap_or(values[nearest]);
                let idx = pos + k * period;
                if idx < out.len() {
                    out[idx] = fitted;
                }
            }
        }
        out
    }
}

impl Default for Stl {
    fn default() -> Self {
        Self::new(24)
    }
}

/// Local-linear tricube LOESS evaluated at position `x` over indices
/// `0..values.len()`.
///
/// Returns `None` when every weight in the neighbourhood vanishes.
fn loess_at(values: &[f64], rho: &[f64], x: f64, span: usize) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let q = span.min(n);
    let center = x.round().clamp(0.0, (n - 1) as f64) as usize;
    let left = center.saturating_sub(q / 2).min(n - q);
    let right = left + q - 1;

    let mut h = (x - left as f64).max(right as f64 - x);
    if span > n {
        h += ((span - n) / 2) as f64;
    }

    let mut w = vec![0.0; q];
    let mut total = 0.0;
    for (slot, j) in (left..=right).enumerate() {
        let r = (j as f64 - x).abs();
        let kernel = if r <= 0.001 * h {
            1.0
        } else if r <= 0.999 * h {
            (1.0 - (r / h).powi(3)).powi(3)
        } else {
            0.0
        };
        w[slot] = kernel * rho[j];
        total += w[slot];
    }
    if total <= 0.0 {
        return None;
    }
    w.iter_mut().for_each(|wi| *wi /= total);

    if h > 0.0 {
        let a: f64 = (left..=right).zip(&w).map(|(j, wi)| wi * j as f64).sum();
        let b: f64 = (left..=right)
            .zip(&w)
            .map(|(j, wi)| wi * (j as f64 - a).powi(2))
            .sum();
        if b.sqrt() > 0.001 * (n - 1) as f64 {
            let slope = (x - a) / b;
            for (slot, j) in (left..=right).enumerate() {
                w[slot] *= slope * (j as f64 - a) + 1.0;
            }
        }
    }

    Some((left..=right).zip(&w).map(|(j, wi)| wi * values[j]).sum())
}

/// LOESS at every index; falls back to the raw value where the fit is empty.
fn loess_smooth(values: &[f64], rho: &[f64], span: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| loess_at(values, rho, i as f64, span).unwrap_or(values[i]))
        .collect()
}

/// Trailing moving average; output is `window - 1` shorter than the input.
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if values.len() < window {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }
    out
}

/// MA(period), MA(period), MA(3) then LOESS; maps `n + 2·period` points back
/// to `n`.
fn low_pass_filter(cycle: &[f64], period: usize, span: usize) -> Vec<f64> {
    let smoothed = moving_average(&moving_average(&moving_average(cycle, period), period), 3);
    let ones = vec![1.0; smoothed.len()];
    loess_smooth(&smoothed, &ones, span)
}

/// Bisquare weights on `|r| / (6 · median|r|)`.
fn robustness_weights(remainder: &[f64], observed: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    let h = 6.0 * median(&abs);
    let scale = observed.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if !(h > 1e-12 * (1.0 + scale)) {
        return vec![1.0; remainder.len()];
    }
    abs.iter()
        .map(|r| {
            let u = r / h;
            if u <= 0.001 {
                1.0
            } else if u <= 0.999 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utc_hour;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn generate_seasonal_series(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let trend = 0.1 * i as f64;
                let seasonal = 10.0 * (2.0 * PI * i as f64 / period as f64).sin();
                trend + seasonal
            })
            .collect()
    }

    fn hourly(values: Vec<f64>) -> TimeSeries {
        TimeSeries::hourly(utc_hour(2021, 1, 1, 0).unwrap(), values).unwrap()
    }

    #[test]
    fn stl_reconstructs_observed() {
        let series = hourly(generate_seasonal_series(240, 24));
        let result = Stl::new(24).with_seasonal_window(13).decompose(&series).unwrap();

        assert_eq!(result.trend.len(), series.len());
        assert_eq!(result.trend.timestamps(), series.timestamps());
        for i in 0..series.len() {
            let reconstructed = result.trend.values()[i]
                + result.seasonal.values()[i]
                + result.residual.values()[i];
            assert_relative_eq!(reconstructed, series.values()[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn stl_recovers_sine_and_linear_trend() {
        let period = 12;
        let values = generate_seasonal_series(240, period);
        let parts = Stl::new(period).decompose_values(&values).unwrap();

        // Away from the edges the linear trend and the sine are recovered.
        for i in 2 * period..values.len() - 2 * period {
            assert_relative_eq!(parts.trend[i], 0.1 * i as f64, epsilon = 0.5);
            let expected = 10.0 * (2.0 * PI * i as f64 / period as f64).sin();
            assert_relative_eq!(parts.seasonal[i], expected, epsilon = 0.5);
        }
    }

    #[test]
    fn stl_detects_seasonality() {
        let series = hourly(generate_seasonal_series(120, 12));
        let result = Stl::new(12).decompose(&series).unwrap();

        let strength = result.seasonal_strength();
        assert!(strength > 0.9, "expected strong seasonality, got {strength}");
        assert!((0.0..=1.0).contains(&result.trend_strength()));
    }

    #[test]
    fn stl_detects_trend() {
        let values: Vec<f64> = (0..120)
            .map(|i| 2.0 * i as f64 + 0.1 * (2.0 * PI * i as f64 / 12.0).sin())
            .collect();
        let result = Stl::new(12).decompose(&hourly(values)).unwrap();

        let strength = result.trend_strength();
        assert!(strength > 0.9, "expected strong trend, got {strength}");
    }

    #[test]
    fn stl_constant_series() {
        let result = Stl::new(10).robust(true).decompose(&hourly(vec![5.0; 100])).unwrap();

        for i in 0..100 {
            assert_relative_eq!(result.seasonal.values()[i], 0.0, epsilon = 1e-8);
            assert_relative_eq!(result.trend.values()[i], 5.0, epsilon = 1e-8);
            assert_relative_eq!(result.residual.values()[i], 0.0, epsilon = 1e-8);
        }
        assert_eq!(result.seasonal_strength(), 0.0);
    }

    #[test]
    fn stl_robust_isolates_spikes_in_residual() {
        let period = 12;
        let mut values = generate_seasonal_series(240, period);
        values[100] += 200.0;
        values[150] -= 200.0;

        let parts = Stl::new(period).robust(true).decompose_values(&values).unwrap();

        assert!(parts.remainder[100] > 150.0);
        assert!(parts.remainder[150] < -150.0);
        assert_relative_eq!(parts.trend[100], 10.0, epsilon = 2.0);
    }

    #[test]
    fn stl_insufficient_data() {
        let err = Stl::new(12).decompose_values(&[1.0; 23]).unwrap_err();
        assert_eq!(err, AnalysisError::InsufficientData { needed: 24, got: 23 });
    }

    #[test]
    fn stl_rejects_missing_values() {
        let mut values = vec![1.0; 48];
        values[5] = f64::NAN;
        assert_eq!(
            Stl::new(12).decompose_values(&values),
            Err(AnalysisError::MissingValues)
        );
    }

    #[test]
    fn stl_window_defaults_and_validation() {
        let stl = Stl::new(24).with_seasonal_window(13);
        // 1.5 * 24 / (1 - 1.5 / 13) = 40.7 -> 41
        assert_eq!(stl.trend_window(), 41);
        assert_eq!(stl.low_pass_window(), 25);
        assert_eq!(Stl::new(24).with_seasonal_window(12).seasonal_window(), 13);

        let short_trend = Stl::new(24).with_trend_window(11);
        assert!(matches!(
            short_trend.decompose_values(&[0.0; 100]),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            Stl::new(24).with_seasonal_window(1).decompose_values(&[0.0; 100]),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn moving_average_shortens_output() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(ma, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn loess_reproduces_lines() {
        let values: Vec<f64> = (0..20).map(|i| 3.0 + 0.5 * i as f64).collect();
        let ones = vec![1.0; 20];
        // Including extrapolation one step beyond each end.
        for x in [-1.0, 0.0, 7.0, 19.0, 20.0] {
            let fitted = loess_at(&values, &ones, x, 7).unwrap();
            assert_relative_eq!(fitted, 3.0 + 0.5 * x, epsilon = 1e-9);
        }
    }

    #[test]
    fn seasonally_adjusted_removes_the_cycle() {
        let series = hourly(generate_seasonal_series(240, 24));
        let result = Stl::new(24)
            .with_low_pass_window(25)
            .with_inner_iterations(3)
            .with_outer_iterations(2)
            .robust(true)
            .decompose(&series)
            .unwrap();

        let adjusted = result.seasonally_adjusted().unwrap();
        assert_eq!(adjusted.timestamps(), series.timestamps());
        for i in 0..series.len() {
            let expected = result.trend.values()[i] + result.residual.values()[i];
            assert_relative_eq!(adjusted.values()[i], expected, epsilon = 1e-9);
        }
        for i in 48..192 {
            assert_relative_eq!(adjusted.values()[i], 0.1 * i as f64, epsilon = 1.0);
        }
    }
}
