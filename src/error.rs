//! Error types for the energy-analytics engine.

use thiserror::Error;

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors returned by the analytics components.
///
/// Every component reports failures through this enum; none of them retries
/// internally or prints anything.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Input could not be parsed into the expected shape.
    #[error("data format error: {0}")]
    DataFormat(String),

    /// Fewer than two valid observations remain after preparation.
    #[error("empty series: need at least 2 valid observations, got {got}")]
    EmptySeries { got: usize },

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Two series share no timestamps after alignment.
    #[error("insufficient overlap: series share no timestamps after alignment")]
    InsufficientOverlap,

    /// Nothing left to analyse (e.g. no hydrological season with data).
    #[error("no data: {0}")]
    NoData(String),

    /// Model estimation failed or did not converge.
    #[error("model fit error: {0}")]
    ModelFit(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Missing values detected when not allowed.
    #[error("missing values detected in data")]
    MissingValues,

    /// Index out of bounds.
    #[error("index out of bounds: {index} (size: {size})")]
    IndexOutOfBounds { index: usize, size: usize },
}
