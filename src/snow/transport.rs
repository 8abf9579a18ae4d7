//! Seasonal potential and actual snow transport.

use crate::data::{WeatherField, WeatherFrame};
use crate::error::{AnalysisError, Result};
use crate::snow::sector::SectorTransport;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Denominator of the wind-speed power law, kg/m.
const TRANSPORT_DIVISOR: f64 = 233_847.0;

/// Wind-speed exponent of the power law.
const WIND_EXPONENT: f64 = 3.8;

/// Potential transport contributed by one sample of `seconds` at wind speed
/// `wind_speed` (m/s). Missing or negative speeds contribute nothing.
pub fn hourly_potential_transport(wind_speed: f64, seconds: f64) -> f64 {
    if wind_speed.is_finite() && wind_speed > 0.0 {
        wind_speed.powf(WIND_EXPONENT) * seconds / TRANSPORT_DIVISOR
    } else {
        0.0
    }
}

/// Start year of the hydrological season containing `t`.
///
/// A season runs from July 1 00:00 UTC through June 30 23:59:59 of the
/// following year.
pub fn hydrological_season(t: &DateTime<Utc>) -> i32 {
    if t.month() >= 7 {
        t.year()
    } else {
        t.year() - 1
    }
}

/// Drift model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnowTransportParams {
    /// Maximum transport distance `T`, m.
    pub max_transport_distance: f64,
    /// Fetch distance `F`, m.
    pub fetch_distance: f64,
    /// Relocation coefficient `θ`.
    pub relocation_coefficient: f64,
    /// Precipitation counts as snow below this temperature, °C.
    pub snowfall_temperature: f64,
    /// Seconds represented by one sample.
    pub sample_seconds: f64,
}

impl Default for SnowTransportParams {
    fn default() -> Self {
        Self {
            max_transport_distance: 3000.0,
            fetch_distance: 30_000.0,
            relocation_coefficient: 0.5,
            snowfall_temperature: 1.0,
            sample_seconds: 3600.0,
        }
    }
}

impl SnowTransportParams {
    pub fn new(max_transport_distance: f64, fetch_distance: f64, relocation_coefficient: f64) -> Self {
        Self {
            max_transport_distance,
            fetch_distance,
            relocation_coefficient,
            ..Default::default()
        }
    }

    pub fn with_sample_seconds(mut self, seconds: f64) -> Self {
        self.sample_seconds = seconds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_transport_distance > 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "transport distance must be positive, got {}",
                self.max_transport_distance
            )));
        }
        if !(self.fetch_distance >= 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "fetch distance must be non-negative, got {}",
                self.fetch_distance
            )));
        }
        if !(0.0..=1.0).contains(&self.relocation_coefficient) {
            return Err(AnalysisError::InvalidParameter(format!(
                "relocation coefficient must lie in [0, 1], got {}",
                self.relocation_coefficient
            )));
        }
        if !(self.sample_seconds > 0.0) {
            return Err(AnalysisError::InvalidParameter(
                "sample duration must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `1 − 0.14^(F/T)`: fraction of the input transport reaching the end
    /// of the fetch.
    pub fn fetch_factor(&self) -> f64 {
        1.0 - 0.14f64.powf(self.fetch_distance / self.max_transport_distance)
    }
}

/// Which quantity limits seasonal transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlRegime {
    Wind,
    Snowfall,
}

impl fmt::Display for ControlRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRegime::Wind => write!(f, "wind"),
            ControlRegime::Snowfall => write!(f, "snowfall"),
        }
    }
}

/// Transport for one hydrological season. Masses are kg/m, water
/// equivalents mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonTransport {
    /// Calendar year in which the season starts.
    pub season: i32,
    pub hours: usize,
    /// Wind-driven potential transport.
    pub qupot: f64,
    /// Snow water equivalent from precipitation below the snowfall threshold.
    pub swe: f64,
    /// Snowfall-limited potential transport `0.5 · T · Swe`.
    pub qspot: f64,
    /// Relocatable snow `θ · Swe`.
    pub srwe: f64,
    /// Regime-selected input transport.
    pub qinf: f64,
    /// Actual transport at the end of the fetch.
    pub qt: f64,
    pub regime: ControlRegime,
}

impl SeasonTransport {
    /// `"2021-2022"` style label.
    pub fn label(&self) -> String {
        format!("{}-{}", self.season, self.season + 1)
    }

    pub fn qt_tonnes(&self) -> f64 {
        self.qt / 1000.0
    }

    fn from_totals(season: i32, hours: usize, qupot: f64, swe: f64, params: &SnowTransportParams) -> Self {
        let t = params.max_transport_distance;
        let qspot = 0.5 * t * swe;
        let srwe = params.relocation_coefficient * swe;
        let (regime, qinf) = if qupot > qspot {
            (ControlRegime::Snowfall, 0.5 * t * srwe)
        } else {
            (ControlRegime::Wind, qupot)
        };
        Self {
            season,
            hours,
            qupot,
            swe,
            qspot,
            srwe,
            qinf,
            qt: qinf * params.fetch_factor(),
            regime,
        }
    }
}

/// Per-season transport plus the mean directional rose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnowTransportReport {
    /// Seasons in chronological order.
    pub seasons: Vec<SeasonTransport>,
    /// Potential transport rose of each season, aligned with `seasons`.
    pub season_sectors: Vec<SectorTransport>,
    /// Arithmetic mean of `season_sectors`.
    pub mean_sectors: SectorTransport,
}

impl SnowTransportReport {
    pub fn season_count(&self) -> usize {
        self.seasons.len()
    }

    pub fn mean_qt(&self) -> f64 {
        self.seasons.iter().map(|s| s.qt).sum::<f64>() / self.seasons.len() as f64
    }

    pub fn max_qt(&self) -> f64 {
        self.seasons.iter().map(|s| s.qt).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean_qt_tonnes(&self) -> f64 {
        self.mean_qt() / 1000.0
    }

    pub fn max_qt_tonnes(&self) -> f64 {
        self.max_qt() / 1000.0
    }
}

#[derive(Default)]
struct SeasonAccumulator {
    hours: usize,
    qupot: f64,
    swe: f64,
    sectors: SectorTransport,
    unsectored: usize,
}

/// Tabler (2003) drift model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnowTransportModel {
    params: SnowTransportParams,
}

impl SnowTransportModel {
    pub fn new(params: SnowTransportParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SnowTransportParams {
        &self.params
    }

    /// Compute seasonal transport and the directional rose.
    ///
    /// Every row counts towards its season's potential transport. Hours
    /// without a valid direction are left out of the rose only. Fails with
    /// [`AnalysisError::NoData`] if the frame holds no rows.
    pub fn compute(&self, weather: &WeatherFrame) -> Result<SnowTransportReport> {
        self.params.validate()?;

        let temperature = weather.column(WeatherField::Temperature);
        let precipitation = weather.column(WeatherField::Precipitation);
        let wind_speed = weather.column(WeatherField::WindSpeed);
        let wind_direction = weather.column(WeatherField::WindDirection);

        let mut seasons: BTreeMap<i32, SeasonAccumulator> = BTreeMap::new();
        for (i, t) in weather.timestamps().iter().enumerate() {
            let acc = seasons.entry(hydrological_season(t)).or_default();
            acc.hours += 1;

            let q = hourly_potential_transport(wind_speed[i], self.params.sample_seconds);
            acc.qupot += q;
            if !acc.sectors.add(wind_direction[i], q) {
                acc.unsectored += 1;
            }

            let p = precipitation[i];
            if temperature[i] < self.params.snowfall_temperature && p.is_finite() && p > 0.0 {
                acc.swe += p;
            }
        }

        if seasons.is_empty() {
            return Err(AnalysisError::NoData(
                "no weather rows fall in any hydrological season".to_string(),
            ));
        }

        let mut report_seasons = Vec::with_capacity(seasons.len());
        let mut season_sectors = Vec::with_capacity(seasons.len());
        for (season, acc) in seasons {
            if acc.unsectored > 0 {
                debug!(season, hours = acc.unsectored, "hours without wind direction left out of rose");
            }
            let transport = SeasonTransport::from_totals(season, acc.hours, acc.qupot, acc.swe, &self.params);
            debug!(
                season,
                hours = acc.hours,
                qt = transport.qt,
                regime = %transport.regime,
                "season transport"
            );
            report_seasons.push(transport);
            season_sectors.push(acc.sectors);
        }

        let mean_sectors = SectorTransport::mean(&season_sectors);
        Ok(SnowTransportReport {
            seasons: report_seasons,
            season_sectors,
            mean_sectors,
        })
    }
}
