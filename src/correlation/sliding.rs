//! Rolling Pearson correlation of one series shifted against another.
//!
//! Positions whose window is incomplete, holds a missing value or has no
//! variance are left undefined rather than filled.

use crate::core::TimeSeries;
use crate::error::{AnalysisError, Result};
use crate::prepare::inner_join;
use crate::utils::stats::pearson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lag and window of a sliding correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Steps by which series A is delayed relative to B. The value at
    /// position `t` correlates `A[t − lag]` with `B[t]`.
    pub lag: i64,
    /// Trailing window length in steps, at least 2.
    pub window: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { lag: 0, window: 72 }
    }
}

impl CorrelationConfig {
    pub fn new(lag: i64, window: usize) -> Self {
        Self { lag, window }
    }
}

/// Summary over the defined positions of a [`CorrelationSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub defined: usize,
}

/// Correlation coefficient per index position; `None` where the window is
/// incomplete, holds a missing value or has zero variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<Option<f64>>,
    pub config: CorrelationConfig,
}

impl CorrelationSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(timestamp, coefficient)` for defined positions only.
    pub fn defined(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps
            .iter()
            .zip(&self.values)
            .filter_map(|(t, v)| v.map(|c| (*t, c)))
    }

    /// Mean, maximum and minimum over defined positions; `None` if there
    /// are none.
    pub fn summary(&self) -> Option<CorrelationSummary> {
        let mut defined = 0usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        for (_, c) in self.defined() {
            defined += 1;
            sum += c;
            max = max.max(c);
            min = min.min(c);
        }
        (defined > 0).then(|| CorrelationSummary {
            mean: sum / defined as f64,
            max,
            min,
            defined,
        })
    }

    /// As a [`TimeSeries`] with NaN at undefined positions.
    pub fn to_time_series(&self) -> Result<TimeSeries> {
        let values = self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        Ok(TimeSeries::new(self.timestamps.clone(), values)?.with_label("correlation"))
    }
}

/// Rolling Pearson correlation of `a` shifted by `lag` against `b`.
///
/// Series with differing indices are inner-joined first. The first
/// `window − 1 + max(lag, 0)` positions are undefined, and for negative lags
/// so are the last `|lag|`. Swapping the inputs and negating the lag yields
/// the same coefficients shifted by `lag` positions.
///
/// Fails with [`AnalysisError::InsufficientOverlap`] when the series share no
/// valid timestamps.
pub fn sliding_correlation(
    a: &TimeSeries,
    b: &TimeSeries,
    config: &CorrelationConfig,
) -> Result<CorrelationSeries> {
    if config.window < 2 {
        return Err(AnalysisError::InvalidParameter(format!(
            "correlation window must be at least 2, got {}",
            config.window
        )));
    }

    let joined;
    let (a, b) = if a.timestamps() == b.timestamps() {
        (a, b)
    } else {
        joined = inner_join(a, b)?;
        (&joined.0, &joined.1)
    };
    if a.is_empty() {
        return Err(AnalysisError::InsufficientOverlap);
    }

    let n = a.len();
    let (va, vb) = (a.values(), b.values());
    let shifted = |t: usize| -> Option<f64> {
        let src = t as i64 - config.lag;
        if (0..n as i64).contains(&src) {
            Some(va[src as usize]).filter(|v| v.is_finite())
        } else {
            None
        }
    };

    let mut xs = Vec::with_capacity(config.window);
    let mut ys = Vec::with_capacity(config.window);
    let values: Vec<Option<f64>> = (0..n)
        .map(|t| {
            if t + 1 < config.window {
                return None;
            }
            xs.clear();
            ys.clear();
            for s in t + 1 - config.window..=t {
                let x = shifted(s)?;
                let y = Some(vb[s]).filter(|v| v.is_finite())?;
                xs.push(x);
                ys.push(y);
            }
            pearson(&xs, &ys)
        })
        .collect();

    debug!(
        n,
        lag = config.lag,
        window = config.window,
        defined = values.iter().filter(|v| v.is_some()).count(),
        "sliding correlation"
    );

    Ok(CorrelationSeries {
        timestamps: a.timestamps().to_vec(),
        values,
        config: *config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utc_hour;
    use approx::assert_relative_eq;
    use chrono::Duration;
    use std::f64::consts::PI;

    fn hourly(values: Vec<f64>) -> TimeSeries {
        TimeSeries::hourly(utc_hour(2021, 1, 1, 0).unwrap(), values).unwrap()
    }

    fn noisy(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64 * 0.7).sin() + 0.3 * (i as f64 * 1.9).cos()).collect()
    }

    #[test]
    fn self_correlation_is_one() {
        let a = hourly(noisy(200));
        let corr = sliding_correlation(&a, &a, &CorrelationConfig::new(0, 24)).unwrap();

        assert_eq!(corr.len(), 200);
        assert!(corr.values[..23].iter().all(Option::is_none));
        for (_, c) in corr.defined() {
            assert_relative_eq!(c, 1.0, epsilon = 1e-12);
        }
        assert_eq!(corr.summary().unwrap().defined, 177);
    }

    #[test]
    fn positive_lag_aligns_delayed_copy() {
        // b(t) = a(t - 6): b lags a by six hours.
        let a: Vec<f64> = (0..240).map(|i| (2.0 * PI * i as f64 / 24.0).sin()).collect();
        let b: Vec<f64> = (0..240).map(|i| (2.0 * PI * (i as f64 - 6.0) / 24.0).sin()).collect();
        let (a, b) = (hourly(a), hourly(b));

        let aligned = sliding_correlation(&a, &b, &CorrelationConfig::new(6, 48)).unwrap();
        assert!(aligned.values[..53].iter().all(Option::is_none));
        for (_, c) in aligned.defined() {
            assert_relative_eq!(c, 1.0, epsilon = 1e-9);
        }

        // A quarter period of misalignment leaves the pair uncorrelated.
        let unshifted = sliding_correlation(&a, &b, &CorrelationConfig::new(0, 48)).unwrap();
        assert_relative_eq!(unshifted.summary().unwrap().mean, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn swapping_inputs_negates_lag() {
        let a = hourly(noisy(150));
        let b = hourly((0..150).map(|i| (i as f64 * 0.31).cos() + 0.01 * i as f64).collect());
        let lag = 5i64;

        let ab = sliding_correlation(&a, &b, &CorrelationConfig::new(lag, 20)).unwrap();
        let ba = sliding_correlation(&b, &a, &CorrelationConfig::new(-lag, 20)).unwrap();

        for t in lag as usize..150 {
            match (ab.values[t], ba.values[t - lag as usize]) {
                (Some(x), Some(y)) => assert_relative_eq!(x, y, epsilon = 1e-12),
                (None, None) => {}
                other => panic!("definedness differs at {t}: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_value_blanks_its_windows() {
        let mut values = noisy(50);
        values[30] = f64::NAN;
        let a = hourly(values);
        let b = hourly(noisy(50));

        let corr = sliding_correlation(&a, &b, &CorrelationConfig::new(0, 5)).unwrap();
        assert!(corr.values[29].is_some());
        assert!(corr.values[30..35].iter().all(Option::is_none));
        assert!(corr.values[35].is_some());
    }

    #[test]
    fn constant_window_is_undefined() {
        let a = hourly(vec![1.0; 10]);
        let b = hourly(noisy(10));
        let corr = sliding_correlation(&a, &b, &CorrelationConfig::new(0, 3)).unwrap();
        assert!(corr.values.iter().all(Option::is_none));
        assert!(corr.summary().is_none());
        assert!(corr.to_time_series().unwrap().values().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn tiny_magnitudes_still_correlate() {
        let a: Vec<f64> = (0..120).map(|i| (0.3 * i as f64).sin() * 1e-9).collect();
        let b: Vec<f64> = (0..120)
            .map(|i| (0.3 * i as f64).sin() * 1e-9 + (1.7 * i as f64).cos() * 1e-10)
            .collect();
        let config = CorrelationConfig::new(0, 24);

        let tiny = sliding_correlation(&hourly(a.clone()), &hourly(b.clone()), &config).unwrap();
        let unit = sliding_correlation(
            &hourly(a.iter().map(|v| v * 1e9).collect()),
            &hourly(b.iter().map(|v| v * 1e9).collect()),
            &config,
        )
        .unwrap();

        assert_eq!(tiny.summary().unwrap().defined, 97);
        for (x, y) in tiny.values.iter().zip(&unit.values) {
            match (x, y) {
                (Some(x), Some(y)) => assert_relative_eq!(*x, *y, epsilon = 1e-9),
                (None, None) => {}
                other => panic!("definedness differs: {other:?}"),
            }
        }
    }

    #[test]
    fn disjoint_series_have_no_overlap() {
        let a = hourly(noisy(10));
        let b = TimeSeries::hourly(utc_hour(2021, 1, 1, 0).unwrap() + Duration::days(10), noisy(10)).unwrap();
        assert_eq!(
            sliding_correlation(&a, &b, &CorrelationConfig::default()),
            Err(AnalysisError::InsufficientOverlap)
        );
    }

    #[test]
    fn unequal_indices_are_joined() {
        let t0 = utc_hour(2021, 1, 1, 0).unwrap();
        let a = TimeSeries::hourly(t0, noisy(40)).unwrap();
        let b = TimeSeries::hourly(t0 + Duration::hours(10), noisy(40)).unwrap();
        let corr = sliding_correlation(&a, &b, &CorrelationConfig::new(0, 4)).unwrap();
        assert_eq!(corr.len(), 30);
        assert_eq!(corr.timestamps[0], t0 + Duration::hours(10));
    }

    #[test]
    fn window_below_two_is_rejected() {
        let a = hourly(noisy(10));
        assert!(matches!(
            sliding_correlation(&a, &a, &CorrelationConfig::new(0, 1)),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
