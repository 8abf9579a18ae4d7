//! # energy-analytics
//!
//! Time series analytics for hourly energy production, consumption and
//! weather data.
//!
//! Components are synchronous and deterministic, and none of them mutates its
//! inputs:
//! - [`prepare`] and [`data`]: parse loosely typed records into clean series
//! - [`seasonality`]: STL decomposition
//! - [`spectral`]: short-time Fourier spectrogram and orthonormal DCT
//! - [`snow`]: seasonal snow drift and directional transport (Tabler 2003)
//! - [`correlation`]: lagged sliding-window correlation
//! - [`detection`]: SPC/DCT and local outlier factor detectors
//! - [`forecast`]: SARIMAX fitting and forecasting
//! - [`cache`]: caller-owned memoization keyed by inputs and parameters
//!
//! Diagnostics go through `tracing`; the crate never installs a subscriber.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod cache;
pub mod config;
pub mod core;
pub mod correlation;
pub mod data;
pub mod detection;
pub mod error;
pub mod forecast;
pub mod prepare;
pub mod seasonality;
pub mod snow;
pub mod spectral;
pub mod utils;

pub use error::{AnalysisError, Result};

pub mod prelude {
    pub use crate::cache::{CacheKey, ResultCache};
    pub use crate::config::AnalysisDefaults;
    pub use crate::core::TimeSeries;
    pub use crate::correlation::{sliding_correlation, CorrelationConfig, CorrelationSeries};
    pub use crate::data::{EnergyRecord, RawTable, WeatherField, WeatherFrame, WeatherRecord};
    pub use crate::detection::{
        detect_outliers, AnomalyDetector, LofConfig, OutlierMethod, OutlierReport, SpcConfig,
    };
    pub use crate::error::{AnalysisError, Result};
    pub use crate::forecast::{forecast, ForecastResult, Sarimax, SarimaxConfig, SarimaxOrder};
    pub use crate::prepare::{prepare, resample_hourly};
    pub use crate::seasonality::{Decomposition, Stl};
    pub use crate::snow::{SnowTransportModel, SnowTransportParams, SnowTransportReport};
    pub use crate::spectral::{spectrogram, Spectrogram, SpectrogramConfig};
}
