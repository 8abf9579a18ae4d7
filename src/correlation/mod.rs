//! Lagged rolling-window correlation between two aligned series.

mod sliding;

pub use sliding::{sliding_correlation, CorrelationConfig, CorrelationSeries, CorrelationSummary};
