//! Outlier and anomaly detection.
//!
//! Two detectors share one report shape:
//! - [`SpcConfig`]: DCT high-pass plus robust control limits, for slowly
//!   varying signals such as temperature.
//! - [`LofConfig`]: local outlier factor in value space, for bursty signals
//!   such as precipitation.

mod lof;
mod spc;

pub use lof::{local_outlier_factors, LofConfig, LofSummary};
pub use spc::{ControlLimits, SpcConfig, SpcSummary};

use crate::core::TimeSeries;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A detector that flags rows of a series.
pub trait AnomalyDetector {
    /// Smallest series length the detector accepts.
    fn min_points(&self) -> usize;

    /// Score every row and flag the anomalous ones.
    fn detect(&self, series: &TimeSeries) -> Result<OutlierReport>;
}

/// One flagged row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedPoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub score: f64,
}

/// Detector-specific summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum OutlierSummary {
    Spc(SpcSummary),
    Lof(LofSummary),
}

/// Result of an outlier detection run.
///
/// `flagged` is a subset of the input rows in index order; `scores` has one
/// entry per input row, higher meaning more anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub flagged: Vec<FlaggedPoint>,
    pub scores: Vec<f64>,
    pub summary: OutlierSummary,
    /// Control-limit curves, for the SPC detector only.
    pub control_limits: Option<ControlLimits>,
}

impl OutlierReport {
    pub(crate) fn from_flags(
        series: &TimeSeries,
        flags: &[bool],
        scores: Vec<f64>,
        summary: OutlierSummary,
        control_limits: Option<ControlLimits>,
    ) -> Self {
        let flagged = series
            .iter()
            .zip(flags)
            .zip(&scores)
            .enumerate()
            .filter(|(_, ((_, flag), _))| **flag)
            .map(|(index, (((timestamp, value), _), score))| FlaggedPoint {
                index,
                timestamp,
                value,
                score: *score,
            })
            .collect();
        Self {
            flagged,
            scores,
            summary,
            control_limits,
        }
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }

    /// Fraction of rows flagged, in `[0, 1]`.
    pub fn proportion(&self) -> f64 {
        if self.scores.is_empty() {
            0.0
        } else {
            self.flagged.len() as f64 / self.scores.len() as f64
        }
    }

    pub fn flagged_indices(&self) -> Vec<usize> {
        self.flagged.iter().map(|p| p.index).collect()
    }

    pub fn is_flagged(&self, index: usize) -> bool {
        self.flagged
            .binary_search_by_key(&index, |p| p.index)
            .is_ok()
    }
}

/// Detector selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutlierMethod {
    Spc(SpcConfig),
    Lof(LofConfig),
}

impl AnomalyDetector for OutlierMethod {
    fn min_points(&self) -> usize {
        match self {
            OutlierMethod::Spc(config) => config.min_points(),
            OutlierMethod::Lof(config) => config.min_points(),
        }
    }

    fn detect(&self, series: &TimeSeries) -> Result<OutlierReport> {
        match self {
            OutlierMethod::Spc(config) => config.detect(series),
            OutlierMethod::Lof(config) => config.detect(series),
        }
    }
}

/// Detect outliers with the chosen method.
pub fn detect_outliers(series: &TimeSeries, method: &OutlierMethod) -> Result<OutlierReport> {
    method.detect(series)
}
