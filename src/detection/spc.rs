//! Statistical process control on DCT high-pass residuals.
//!
//! The lowest `freq_cutoff` DCT coefficients carry the seasonal cycle and
//! trend. Zeroing them and inverting leaves the seasonally adjusted
//! variations (SATV), which are compared against `median ± k · 1.4826 · MAD`.

use crate::core::TimeSeries;
use crate::detection::{AnomalyDetector, OutlierReport, OutlierSummary};
use crate::error::{AnalysisError, Result};
use crate::spectral::{dct_ortho, idct_ortho};
use crate::utils::stats::{mad, median, MAD_SCALE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// SPC detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpcConfig {
    /// Number of low-frequency DCT coefficients removed.
    pub freq_cutoff: usize,
    /// Control-limit width in robust standard deviations.
    pub k: f64,
}

impl Default for SpcConfig {
    fn default() -> Self {
        Self {
            freq_cutoff: 10,
            k: 3.0,
        }
    }
}

impl SpcConfig {
    pub fn new(freq_cutoff: usize, k: f64) -> Self {
        Self { freq_cutoff, k }
    }
}

/// SPC statistics, all on the SATV scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpcSummary {
    pub n_points: usize,
    pub n_outliers: usize,
    pub proportion_outliers: f64,
    pub median_satv: f64,
    pub mad_satv: f64,
    pub robust_sigma: f64,
    pub upper_limit_satv: f64,
    pub lower_limit_satv: f64,
}

/// SATV and the control limits mapped back to the original scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    pub satv: TimeSeries,
    /// `(original − SATV) + upper limit`.
    pub upper: TimeSeries,
    /// `(original − SATV) + lower limit`.
    pub lower: TimeSeries,
}

impl AnomalyDetector for SpcConfig {
    fn min_points(&self) -> usize {
        (self.freq_cutoff + 1).max(3)
    }

    /// Fails with [`AnalysisError::MissingValues`] if the series holds NaN.
    fn detect(&self, series: &TimeSeries) -> Result<OutlierReport> {
        if !(self.k > 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "control-limit width must be positive, got {}",
                self.k
            )));
        }
        let n = series.len();
        if n < self.min_points() {
            return Err(AnalysisError::InsufficientData {
                needed: self.min_points(),
                got: n,
            });
        }
        if series.has_missing_values() {
            return Err(AnalysisError::MissingValues);
        }

        let values = series.values();
        let mut coefficients = dct_ortho(values);
        coefficients[..self.freq_cutoff].fill(0.0);
        let satv = idct_ortho(&coefficients);

        let center = median(&satv);
        let mad_satv = mad(&satv);
        let robust_sigma = MAD_SCALE * mad_satv;
        let upper = center + self.k * robust_sigma;
        let lower = center - self.k * robust_sigma;

        let flags: Vec<bool> = satv.iter().map(|s| *s > upper || *s < lower).collect();
        let scores = satv
            .iter()
            .map(|s| {
                let deviation = (s - center).abs();
                if robust_sigma > 0.0 {
                    deviation / robust_sigma
                } else if deviation > 0.0 {
                    f64::INFINITY
                } else {
                    0.0
                }
            })
            .collect();

        let n_outliers = flags.iter().filter(|f| **f).count();
        debug!(n, n_outliers, robust_sigma, "spc detection");

        let trend: Vec<f64> = values.iter().zip(&satv).map(|(v, s)| v - s).collect();
        let limits = ControlLimits {
            upper: series.with_values(trend.iter().map(|t| t + upper).collect())?,
            lower: series.with_values(trend.iter().map(|t| t + lower).collect())?,
            satv: series.with_values(satv)?.with_label("satv"),
        };

        let summary = SpcSummary {
            n_points: n,
            n_outliers,
            proportion_outliers: n_outliers as f64 / n as f64,
            median_satv: center,
            mad_satv,
            robust_sigma,
            upper_limit_satv: upper,
            lower_limit_satv: lower,
        };

        Ok(OutlierReport::from_flags(
            series,
            &flags,
            scores,
            OutlierSummary::Spc(summary),
            Some(limits),
        ))
    }
}
