//! Seasonal ARIMA forecasting with exogenous regressors.
//!
//! Every call fits a fresh model; nothing is cached here. Fitting is the
//! most expensive operation in the crate, so callers that re-run the same
//! fit should memoize through [`crate::cache::ResultCache`].

pub mod diff;
mod sarimax;

pub use sarimax::{
    forecast, FitMethod, ForecastResult, InformationCriteria, Prediction, Sarimax, SarimaxConfig,
    SarimaxFit, SarimaxOrder, SarimaxParams,
};
