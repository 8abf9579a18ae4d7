//! Turning raw observations into a [`TimeSeries`].

use crate::core::TimeSeries;
use crate::error::{AnalysisError, Result};
use crate::prepare::timestamp::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A loosely typed cell value as delivered by the data-loading layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Numeric cell.
    Number(f64),
    /// Text cell; parsed as a number when possible.
    Text(String),
    /// Empty cell.
    Missing,
}

impl RawValue {
    /// Numeric coercion: anything that is not a finite number becomes NaN.
    pub fn to_f64(&self) -> f64 {
        match self {
            RawValue::Number(v) if v.is_finite() => *v,
            RawValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    /// Text view of the cell, if it holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(RawValue::Missing, RawValue::Number)
    }
}

/// One raw row: a timestamp column and a value column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub timestamp: String,
    pub value: RawValue,
}

impl RawObservation {
    pub fn new(timestamp: impl Into<String>, value: impl Into<RawValue>) -> Self {
        Self {
            timestamp: timestamp.into(),
            value: value.into(),
        }
    }
}

/// Prepare raw rows into a sorted, deduplicated UTC series.
///
/// Rows whose timestamp does not parse are dropped; if none survive the call
/// fails with [`AnalysisError::DataFormat`]. Values that are not numeric become
/// NaN. Rows sharing a timestamp are averaged over their valid values. Fails
/// with [`AnalysisError::EmptySeries`] if fewer than two valid values remain.
pub fn prepare(rows: &[RawObservation]) -> Result<TimeSeries> {
    let mut dropped = 0usize;
    let points: Vec<(DateTime<Utc>, f64)> = rows
        .iter()
        .filter_map(|row| match parse_timestamp(&row.timestamp) {
            Some(ts) => Some((ts, row.value.to_f64())),
            None => {
                dropped += 1;
                None
            }
        })
        .collect();

    if dropped > 0 {
        debug!(dropped, total = rows.len(), "dropped rows with unparseable timestamps");
    }

    if points.is_empty() {
        return Err(AnalysisError::DataFormat(format!(
            "no parseable timestamps among {} rows",
            rows.len()
        )));
    }

    prepare_points(points)
}

/// Prepare already-parsed `(timestamp, value)` pairs.
///
/// Same deduplication and validity rules as [`prepare`].
pub fn prepare_points<I>(points: I) -> Result<TimeSeries>
where
    I: IntoIterator<Item = (DateTime<Utc>, f64)>,
{
    // (sum of valid values, number of valid values)
    let mut groups: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    let mut rows = 0usize;
    for (ts, value) in points {
        rows += 1;
        let entry = groups.entry(ts).or_insert((0.0, 0));
        if value.is_finite() {
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let duplicates = rows - groups.len();
    if duplicates > 0 {
        debug!(duplicates, "averaged duplicate timestamps");
    }

    let (timestamps, values): (Vec<_>, Vec<_>) = groups
        .into_iter()
        .map(|(ts, (sum, count))| {
            let mean = if count > 0 {
                sum / count as f64
            } else {
                f64::NAN
            };
            (ts, mean)
        })
        .unzip();

    let valid = values.iter().filter(|v| v.is_finite()).count();
    if valid < 2 {
        return Err(AnalysisError::EmptySeries { got: valid });
    }

    TimeSeries::new(timestamps, values)
}
