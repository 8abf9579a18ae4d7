//! Series preparation: parsing, deduplication, resampling and alignment.
//!
//! Every analysis component expects a clean [`TimeSeries`](crate::core::TimeSeries).
//! This module turns loosely typed observations into one:
//! - timestamps are parsed to UTC and unparseable rows are dropped
//! - non-numeric values become missing
//! - duplicate timestamps are averaged
//! - series can be resampled onto an hourly grid and gap-filled
//! - pairs of series can be inner-joined or reindexed onto a common index

mod align;
mod preparer;
mod timestamp;

pub use align::{align_to, inner_join, resample_hourly};
pub use preparer::{prepare, prepare_points, RawObservation, RawValue};
pub use timestamp::parse_timestamp;
