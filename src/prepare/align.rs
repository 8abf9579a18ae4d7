//! Resampling and alignment of prepared series.

use crate::core::{backward_fill, forward_fill, TimeSeries};
use crate::error::{AnalysisError, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Resample onto a fixed hourly grid and fill every gap.
///
/// The grid starts at the first timestamp and steps by one hour up to the
/// last one. Grid points without an exact observation start out missing and
/// are filled by linear time interpolation, then forward fill, then backward
/// fill, so no NaN survives at the boundaries.
pub fn resample_hourly(series: &TimeSeries) -> Result<TimeSeries> {
    let (start, end) = match (series.start(), series.end()) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(AnalysisError::EmptySeries { got: 0 }),
    };

    let step = Duration::hours(1);
    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    let mut t = start;
    while t <= end {
        timestamps.push(t);
        values.push(series.value_at(&t).unwrap_or(f64::NAN));
        t += step;
    }

    let gaps = values.iter().filter(|v| !v.is_finite()).count();
    if gaps > 0 {
        debug!(gaps, points = values.len(), "filling gaps on hourly grid");
    }

    let mut grid = TimeSeries::regular(start, step, values)?;
    if let Some(label) = series.label() {
        grid = grid.with_label(label);
    }
    let interpolated = grid.interpolated(false);
    let filled = backward_fill(&forward_fill(interpolated.values()));

    let valid = filled.iter().filter(|v| v.is_finite()).count();
    if valid < 2 {
        return Err(AnalysisError::EmptySeries { got: valid });
    }

    interpolated.with_values(filled)
}

/// Inner-join two series on their timestamps.
///
/// Only timestamps present in both series with a valid value on both sides
/// are kept. Fails with [`AnalysisError::InsufficientOverlap`] if nothing is
/// left.
pub fn inner_join(a: &TimeSeries, b: &TimeSeries) -> Result<(TimeSeries, TimeSeries)> {
    let (mut i, mut j) = (0, 0);
    let (ta, tb) = (a.timestamps(), b.timestamps());
    let (va, vb) = (a.values(), b.values());

    let mut timestamps = Vec::new();
    let mut left = Vec::new();
    let mut right = Vec::new();

    while i < ta.len() && j < tb.len() {
        match ta[i].cmp(&tb[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                if va[i].is_finite() && vb[j].is_finite() {
                    timestamps.push(ta[i]);
                    left.push(va[i]);
                    right.push(vb[j]);
                }
                i += 1;
                j += 1;
            }
        }
    }

    if timestamps.is_empty() {
        return Err(AnalysisError::InsufficientOverlap);
    }

    let mut joined_a = TimeSeries::new(timestamps.clone(), left)?;
    let mut joined_b = TimeSeries::new(timestamps, right)?;
    if let Some(label) = a.label() {
        joined_a = joined_a.with_label(label);
    }
    if let Some(label) = b.label() {
        joined_b = joined_b.with_label(label);
    }
    Ok((joined_a, joined_b))
}

/// Reindex a series onto `index`, filling holes forward then backward.
///
/// Used to put exogenous regressors on the training index of the target
/// series. Index points absent from `series` are missing until filled.
pub fn align_to(series: &TimeSeries, index: &[DateTime<Utc>]) -> Result<TimeSeries> {
    let values: Vec<f64> = index
        .iter()
        .map(|t| series.value_at(t).unwrap_or(f64::NAN))
        .collect();
    let filled = backward_fill(&forward_fill(&values));

    let mut aligned = TimeSeries::new(index.to_vec(), filled)?;
    if let Some(label) = series.label() {
        aligned = aligned.with_label(label);
    }
    Ok(aligned)
}
