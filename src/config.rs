//! Default parameter set of the analysis dashboard.
//!
//! [`AnalysisDefaults`] bundles one configuration per component. It derives
//! serde traits and fills absent fields from [`Default`], so callers can load
//! a partial override from any serde format.

use crate::correlation::CorrelationConfig;
use crate::detection::{LofConfig, SpcConfig};
use crate::error::{AnalysisError, Result};
use crate::forecast::SarimaxConfig;
use crate::seasonality::Stl;
use crate::snow::SnowTransportParams;
use crate::spectral::SpectrogramConfig;
use serde::{Deserialize, Serialize};

/// Default forecast horizon: one week of hourly steps.
pub const DEFAULT_FORECAST_HORIZON: usize = 168;

/// Parameters for every component, as the dashboard presents them initially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    pub decomposition: Stl,
    pub spectrogram: SpectrogramConfig,
    pub snow: SnowTransportParams,
    pub correlation: CorrelationConfig,
    pub spc: SpcConfig,
    pub lof: LofConfig,
    pub forecast: SarimaxConfig,
    pub forecast_horizon: usize,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            decomposition: Stl::new(24)
                .with_seasonal_window(13)
                .with_trend_window(365)
                .robust(true),
            spectrogram: SpectrogramConfig::default(),
            snow: SnowTransportParams::default(),
            correlation: CorrelationConfig::default(),
            spc: SpcConfig::default(),
            lof: LofConfig::default(),
            forecast: SarimaxConfig::default(),
            forecast_horizon: DEFAULT_FORECAST_HORIZON,
        }
    }
}

impl AnalysisDefaults {
    /// Check every component configuration.
    pub fn validate(&self) -> Result<()> {
        self.decomposition.validate()?;
        self.spectrogram.validate()?;
        self.snow.validate()?;
        self.forecast.validate()?;
        if self.correlation.window < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "correlation window must be at least 2, got {}",
                self.correlation.window
            )));
        }
        if !(self.spc.k > 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "control-limit width must be positive, got {}",
                self.spc.k
            )));
        }
        if !(self.lof.contamination > 0.0 && self.lof.contamination <= 0.5) {
            return Err(AnalysisError::InvalidParameter(format!(
                "contamination must lie in (0, 0.5], got {}",
                self.lof.contamination
            )));
        }
        if self.forecast_horizon == 0 {
            return Err(AnalysisError::InvalidParameter(
                "forecast horizon must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
