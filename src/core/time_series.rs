//! TimeSeries data structure for representing hourly observations.

use crate::error::{AnalysisError, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A univariate time series with strictly increasing UTC timestamps.
///
/// Values may be NaN where the source cadence left a hole. Components never
/// mutate a series they receive; every transformation returns a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    label: Option<String>,
    /// Sampling interval in seconds, when known.
    frequency_secs: Option<i64>,
}

impl TimeSeries {
    /// Create a new series, validating ordering and lengths.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(AnalysisError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

        Ok(Self {
            timestamps,
            values,
            label: None,
            frequency_secs: None,
        })
    }

    /// Create a regularly spaced series starting at `start`.
    pub fn regular(start: DateTime<Utc>, step: Duration, values: Vec<f64>) -> Result<Self> {
        if step <= Duration::zero() {
            return Err(AnalysisError::InvalidParameter(
                "step must be positive".to_string(),
            ));
        }
        let timestamps = (0..values.len())
            .map(|i| start + step * i as i32)
            .collect();
        let mut series = Self::new(timestamps, values)?;
        series.frequency_secs = Some(step.num_seconds());
        Ok(series)
    }

    /// Create an hourly series starting at `start`.
    pub fn hourly(start: DateTime<Utc>, values: Vec<f64>) -> Result<Self> {
        Self::regular(start, Duration::hours(1), values)
    }

    /// Attach a label (e.g. the value column name).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Get timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Get values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Get the sampling interval, if known.
    pub fn frequency(&self) -> Option<Duration> {
        self.frequency_secs.map(Duration::seconds)
    }

    /// First timestamp.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    /// Last timestamp.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Iterate over `(timestamp, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Return a new series with the same index and different values.
    pub fn with_values(&self, values: Vec<f64>) -> Result<TimeSeries> {
        if values.len() != self.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        Ok(TimeSeries {
            timestamps: self.timestamps.clone(),
            values,
            label: self.label.clone(),
            frequency_secs: self.frequency_secs,
        })
    }

    /// Extract a slice of the time series.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end {
            return Err(AnalysisError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(AnalysisError::IndexOutOfBounds {
                index: end,
                size: self.len(),
            });
        }

        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            label: self.label.clone(),
            frequency_secs: self.frequency_secs,
        })
    }

    /// Keep observations whose timestamp lies in `[from, to]`.
    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> TimeSeries {
        let start = self.timestamps.partition_point(|t| *t < from);
        let end = self.timestamps.partition_point(|t| *t <= to).max(start);
        TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            label: self.label.clone(),
            frequency_secs: self.frequency_secs,
        }
    }

    /// Value at an exact timestamp, if present.
    pub fn value_at(&self, timestamp: &DateTime<Utc>) -> Option<f64> {
        self.timestamps
            .binary_search(timestamp)
            .ok()
            .map(|i| self.values[i])
    }

    /// Check if series has missing values (NaN or Inf).
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Return a copy with NaN gaps filled by interpolation in time.
    ///
    /// Interior gaps are interpolated linearly against the elapsed time between
    /// the surrounding valid observations. With `fill_edges`, leading and
    /// trailing gaps take the nearest valid value.
    pub fn interpolated(&self, fill_edges: bool) -> TimeSeries {
        let values = interpolate_time(&self.timestamps, &self.values, fill_edges);
        TimeSeries {
            timestamps: self.timestamps.clone(),
            values,
            label: self.label.clone(),
            frequency_secs: self.frequency_secs,
        }
    }

    /// Infer frequency from timestamps as the modal spacing.
    pub fn infer_frequency(&self, tolerance: f64) -> Result<Duration> {
        if self.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                needed: 2,
                got: self.len(),
            });
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for w in self.timestamps.windows(2) {
            *counts.entry((w[1] - w[0]).num_seconds()).or_insert(0) += 1;
        }

        // Ties resolve to the shortest spacing so the result is deterministic.
        let (modal_diff, modal_count) = counts
            .iter()
            .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then(db.cmp(da)))
            .map(|(&diff, &count)| (diff, count))
            .ok_or_else(|| AnalysisError::TimestampError("empty spacing data".to_string()))?;

        let total_count: usize = counts.values().sum();
        if (modal_count as f64 / total_count as f64) < tolerance {
            return Err(AnalysisError::TimestampError(
                "no unique modal spacing found".to_string(),
            ));
        }

        Ok(Duration::seconds(modal_diff))
    }

    /// Known frequency, falling back to the inferred modal spacing.
    pub fn frequency_or_infer(&self) -> Result<Duration> {
        match self.frequency() {
            Some(freq) => Ok(freq),
            None => self.infer_frequency(0.0),
        }
    }
}

/// Build a UTC timestamp, for tests and synthetic inputs.
pub fn utc_hour(year: i32, month: u32, day: u32, hour: u32) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .ok_or_else(|| {
            AnalysisError::TimestampError(format!(
                "invalid date {year:04}-{month:02}-{day:02} {hour:02}:00"
            ))
        })
}

/// Carry the last valid value forward over NaN gaps.
pub(crate) fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last_valid = None;
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                last_valid = Some(v);
                v
            } else {
                last_valid.unwrap_or(f64::NAN)
            }
        })
        .collect()
}

/// Carry the next valid value backward over NaN gaps.
pub(crate) fn backward_fill(values: &[f64]) -> Vec<f64> {
    let mut next_valid = None;
    let mut result: Vec<f64> = values
        .iter()
        .rev()
        .map(|&v| {
            if v.is_finite() {
                next_valid = Some(v);
                v
            } else {
                next_valid.unwrap_or(f64::NAN)
            }
        })
        .collect();
    result.reverse();
    result
}

/// Linear interpolation weighted by elapsed time.
fn interpolate_time(timestamps: &[DateTime<Utc>], values: &[f64], fill_edges: bool) -> Vec<f64> {
    let n = values.len();
    let mut result: Vec<f64> = values
        .iter()
        .map(|&v| if v.is_finite() { v } else { f64::NAN })
        .collect();

    let mut i = 0;
    while i < n {
        if !result[i].is_nan() {
            i += 1;
            continue;
        }

        let start = i;
        while i < n && result[i].is_nan() {
            i += 1;
        }
        let end = i;

        let left = start.checked_sub(1);
        let right = (end < n).then_some(end);

        match (left, right) {
            (Some(l), Some(r)) => {
                let span = (timestamps[r] - timestamps[l]).num_seconds() as f64;
                let (yl, yr) = (result[l], result[r]);
                for idx in start..end {
                    let t = (timestamps[idx] - timestamps[l]).num_seconds() as f64 / span;
                    result[idx] = yl + t * (yr - yl);
                }
            }
            (Some(l), None) if fill_edges => {
                let fill = result[l];
                result[start..end].fill(fill);
            }
            (None, Some(r)) if fill_edges => {
                let fill = result[r];
                result[start..end].fill(fill);
            }
            _ => {}
        }
    }

    result
}
