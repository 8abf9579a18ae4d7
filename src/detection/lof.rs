//! Local Outlier Factor in one-dimensional value space.

use crate::core::TimeSeries;
use crate::detection::{AnomalyDetector, OutlierReport, OutlierSummary};
use crate::error::{AnalysisError, Result};
use crate::utils::stats::percentile;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Added to mean reachability distances so duplicated values keep a finite
/// density.
const DENSITY_EPSILON: f64 = 1e-10;

/// LOF detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LofConfig {
    /// Neighbourhood size; capped at `n − 1`.
    pub n_neighbors: usize,
    /// Expected fraction of anomalies, in `(0, 0.5]`.
    ///
    /// Sets the score threshold, not the flag count: a row is flagged only
    /// when its score is strictly above the `contamination` quantile. Scores
    /// tied at that quantile are all left unflagged, so fewer than
    /// `contamination * n` rows (possibly none) may be flagged. Heavily
    /// repeated values such as dry precipitation hours produce such ties.
    pub contamination: f64,
    /// Replacement for missing values.
    pub missing_fill: f64,
}

impl Default for LofConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 20,
            contamination: 0.01,
            missing_fill: 0.0,
        }
    }
}

impl LofConfig {
    pub fn new(n_neighbors: usize, contamination: f64) -> Self {
        Self {
            n_neighbors,
            contamination,
            ..Default::default()
        }
    }
}

/// LOF statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LofSummary {
    pub n_points: usize,
    pub n_anomalies: usize,
    pub proportion_anomalies: f64,
    /// Mean value over all rows after missing-value fill.
    pub mean_value: f64,
    /// Mean value over flagged rows; `None` when nothing is flagged.
    pub mean_anomalies: Option<f64>,
    /// Rows whose LOF exceeds this are flagged.
    pub threshold: f64,
}

/// Indices of the `k` nearest other points of each point.
///
/// Works on the sorted order: the neighbourhood of a point is a contiguous
/// run around it, grown one step at a time towards the closer side.
fn nearest_neighbors(values: &[f64], k: usize) -> Vec<Vec<usize>> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut neighbors = vec![Vec::with_capacity(k); n];
    for (pos, &i) in order.iter().enumerate() {
        let x = values[i];
        let (mut left, mut right) = (pos, pos + 1);
        let found = &mut neighbors[i];
        while found.len() < k {
            let take_left = match (left > 0, right < n) {
                (true, true) => x - values[order[left - 1]] <= values[order[right]] - x,
                (true, false) => true,
                (false, true) => false,
                (false, false) => break,
            };
            if take_left {
                left -= 1;
                found.push(order[left]);
            } else {
                found.push(order[right]);
                right += 1;
            }
        }
    }
    neighbors
}

/// Local outlier factor of every value with `k` neighbours.
///
/// Values near 1 are inliers; larger values sit in sparser regions than
/// their neighbours.
pub fn local_outlier_factors(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let k = k.min(n.saturating_sub(1)).max(1);
    if n < 2 {
        return vec![1.0; n];
    }

    let neighbors = nearest_neighbors(values, k);
    let dist = |a: usize, b: usize| (values[a] - values[b]).abs();

    let k_distance: Vec<f64> = (0..n)
        .map(|i| neighbors[i].iter().map(|&j| dist(i, j)).fold(0.0, f64::max))
        .collect();

    let lrd: Vec<f64> = (0..n)
        .map(|i| {
            let reach: f64 = neighbors[i]
                .iter()
                .map(|&j| k_distance[j].max(dist(i, j)))
                .sum();
            1.0 / (reach / k as f64 + DENSITY_EPSILON)
        })
        .collect();

    (0..n)
        .map(|i| {
            let neighbor_lrd: f64 = neighbors[i].iter().map(|&j| lrd[j]).sum::<f64>() / k as f64;
            neighbor_lrd / lrd[i]
        })
        .collect()
}

impl AnomalyDetector for LofConfig {
    fn min_points(&self) -> usize {
        2
    }

    /// Flags the rows whose negated LOF falls below the
    /// `100 · contamination` percentile.
    fn detect(&self, series: &TimeSeries) -> Result<OutlierReport> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(AnalysisError::InvalidParameter(format!(
                "contamination must lie in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_neighbors == 0 {
            return Err(AnalysisError::InvalidParameter(
                "n_neighbors must be positive".to_string(),
            ));
        }
        let n = series.len();
        if n < self.min_points() {
            return Err(AnalysisError::InsufficientData {
                needed: self.min_points(),
                got: n,
            });
        }

        let values: Vec<f64> = series
            .values()
            .iter()
            .map(|v| if v.is_finite() { *v } else { self.missing_fill })
            .collect();

        let lof = local_outlier_factors(&values, self.n_neighbors);
        let negated: Vec<f64> = lof.iter().map(|v| -v).collect();
        let offset = percentile(&negated, 100.0 * self.contamination);
        let flags: Vec<bool> = negated.iter().map(|v| *v < offset).collect();

        let flagged_values: Vec<f64> = values
            .iter()
            .zip(&flags)
            .filter(|(_, f)| **f)
            .map(|(v, _)| *v)
            .collect();
        let n_anomalies = flagged_values.len();
        debug!(n, n_anomalies, threshold = -offset, "lof detection");

        let summary = LofSummary {
            n_points: n,
            n_anomalies,
            proportion_anomalies: n_anomalies as f64 / n as f64,
            mean_value: values.iter().sum::<f64>() / n as f64,
            mean_anomalies: (n_anomalies > 0)
                .then(|| flagged_values.iter().sum::<f64>() / n_anomalies as f64),
            threshold: -offset,
        };

        let display = series.with_values(values)?;
        Ok(OutlierReport::from_flags(
            &display,
            &flags,
            lof,
            OutlierSummary::Lof(summary),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utc_hour;
    use approx::assert_relative_eq;

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::hourly(utc_hour(2021, 1, 1, 0).unwrap(), values).unwrap()
    }

    #[test]
    fn neighbors_are_closest_values() {
        let values = [0.0, 10.0, 1.0, 2.5, 11.0];
        let nn = nearest_neighbors(&values, 2);
        let mut first = nn[0].clone();
        first.sort_unstable();
        assert_eq!(first, vec![2, 3]);
        assert_eq!(nn[1], vec![4, 3]);
        assert!(nn.iter().all(|v| v.len() == 2));
    }

    #[test]
    fn uniform_grid_has_unit_lof_in_the_interior() {
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let lof = local_outlier_factors(&values, 4);
        for v in &lof[10..40] {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn isolated_value_has_high_lof() {
        let mut values: Vec<f64> = (0..100).map(|i| (i % 10) as f64 * 0.1).collect();
        values.push(50.0);
        let lof = local_outlier_factors(&values, 20);
        let max_inlier = lof[..100].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(lof[100] > 10.0 * max_inlier);
    }

    #[test]
    fn burst_is_flagged_among_smooth_values() {
        let mut values: Vec<f64> = (0..300)
            .map(|i| 0.5 + 0.3 * (i as f64 * 0.37).sin() + 0.001 * i as f64)
            .collect();
        values[200] = 30.0;
        values[250] = f64::NAN;
        let report = LofConfig::default().detect(&series(values)).unwrap();

        assert!(report.is_flagged(200));
        assert!(report.scores[250].is_finite());
        let OutlierSummary::Lof(summary) = &report.summary else {
            panic!("expected lof summary");
        };
        assert_eq!(summary.n_points, 300);
        assert!(summary.n_anomalies <= 3);
        assert!(summary.mean_anomalies.unwrap() > summary.mean_value);
        assert_eq!(
            report.flagged.iter().find(|p| p.index == 200).map(|p| p.value),
            Some(30.0)
        );
    }

    #[test]
    fn constant_series_flags_nothing() {
        let report = LofConfig::default().detect(&series(vec![0.0; 50])).unwrap();
        assert_eq!(report.flagged_count(), 0);
        assert!(report.scores.iter().all(|s| (*s - 1.0).abs() < 1e-9));
    }

    #[test]
    fn scores_tied_at_the_threshold_are_not_flagged() {
        let mut values = vec![0.0; 100];
        values.extend([5.0, 5.0, -5.0, -5.0]);
        let report = LofConfig::new(20, 0.02).detect(&series(values)).unwrap();

        let tail = &report.scores[100..];
        assert!(tail.iter().all(|s| *s == tail[0]));
        assert!(tail[0] > 1e6);
        assert!(report.scores[..100].iter().all(|s| (*s - 1.0).abs() < 1e-9));
        assert_eq!(report.flagged_count(), 0);
    }

    #[test]
    fn parameters_are_validated() {
        let ts = series(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            LofConfig::new(20, 0.0).detect(&ts),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            LofConfig::default().detect(&series(vec![1.0])),
            Err(AnalysisError::InsufficientData { needed: 2, got: 1 })
        ));
    }
}
