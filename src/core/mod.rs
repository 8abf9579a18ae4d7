//! Core data structures shared by every analysis component.

mod time_series;

pub(crate) use time_series::{backward_fill, forward_fill};
pub use time_series::{utc_hour, TimeSeries};
