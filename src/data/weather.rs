//! Column-aligned hourly weather data.

use crate::core::TimeSeries;
use crate::data::records::WeatherRecord;
use crate::error::{AnalysisError, Result};
use crate::prepare::prepare_points;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A weather variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherField {
    Temperature,
    Precipitation,
    WindSpeed,
    WindGusts,
    WindDirection,
}

impl WeatherField {
    pub const ALL: [WeatherField; 5] = [
        WeatherField::Temperature,
        WeatherField::Precipitation,
        WeatherField::WindSpeed,
        WeatherField::WindGusts,
        WeatherField::WindDirection,
    ];

    /// Column name as served by the weather archive.
    pub fn column_name(&self) -> &'static str {
        match self {
            WeatherField::Temperature => "temperature_2m",
            WeatherField::Precipitation => "precipitation",
            WeatherField::WindSpeed => "wind_speed_10m",
            WeatherField::WindGusts => "wind_gusts_10m",
            WeatherField::WindDirection => "wind_direction_10m",
        }
    }

    fn of(&self, record: &WeatherRecord) -> f64 {
        match self {
            WeatherField::Temperature => record.temperature_2m,
            WeatherField::Precipitation => record.precipitation,
            WeatherField::WindSpeed => record.wind_speed_10m,
            WeatherField::WindGusts => record.wind_gusts_10m,
            WeatherField::WindDirection => record.wind_direction_10m,
        }
    }
}

/// Weather columns sharing one strictly increasing UTC index.
///
/// Missing observations are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherFrame {
    timestamps: Vec<DateTime<Utc>>,
    temperature: Vec<f64>,
    precipitation: Vec<f64>,
    wind_speed: Vec<f64>,
    wind_gusts: Vec<f64>,
    wind_direction: Vec<f64>,
}

impl WeatherFrame {
    /// Build a frame from columns. Gusts are left missing.
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        temperature: Vec<f64>,
        precipitation: Vec<f64>,
        wind_speed: Vec<f64>,
        wind_direction: Vec<f64>,
    ) -> Result<Self> {
        let n = timestamps.len();
        for column in [&temperature, &precipitation, &wind_speed, &wind_direction] {
            if column.len() != n {
                return Err(AnalysisError::DimensionMismatch {
                    expected: n,
                    got: column.len(),
                });
            }
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::TimestampError(
                "weather timestamps must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            timestamps,
            temperature,
            precipitation,
            wind_speed,
            wind_gusts: vec![f64::NAN; n],
            wind_direction,
        })
    }

    /// Build a frame from records: sorted by time, duplicate hours averaged
    /// per column over their valid values.
    pub fn from_records(records: &[WeatherRecord]) -> Result<Self> {
        let mut groups: BTreeMap<DateTime<Utc>, Vec<&WeatherRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.time).or_default().push(record);
        }

        let mean = |rows: &[&WeatherRecord], field: WeatherField| {
            let valid: Vec<f64> = rows
                .iter()
                .map(|r| field.of(r))
                .filter(|v| v.is_finite())
                .collect();
            if valid.is_empty() {
                f64::NAN
            } else {
                valid.iter().sum::<f64>() / valid.len() as f64
            }
        };

        let mut frame = Self {
            timestamps: Vec::with_capacity(groups.len()),
            temperature: Vec::with_capacity(groups.len()),
            precipitation: Vec::with_capacity(groups.len()),
            wind_speed: Vec::with_capacity(groups.len()),
            wind_gusts: Vec::with_capacity(groups.len()),
            wind_direction: Vec::with_capacity(groups.len()),
        };
        for (time, rows) in &groups {
            frame.timestamps.push(*time);
            frame.temperature.push(mean(rows, WeatherField::Temperature));
            frame.precipitation.push(mean(rows, WeatherField::Precipitation));
            frame.wind_speed.push(mean(rows, WeatherField::WindSpeed));
            frame.wind_gusts.push(mean(rows, WeatherField::WindGusts));
            frame.wind_direction.push(mean(rows, WeatherField::WindDirection));
        }
        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Raw column values.
    pub fn column(&self, field: WeatherField) -> &[f64] {
        match field {
            WeatherField::Temperature => &self.temperature,
            WeatherField::Precipitation => &self.precipitation,
            WeatherField::WindSpeed => &self.wind_speed,
            WeatherField::WindGusts => &self.wind_gusts,
            WeatherField::WindDirection => &self.wind_direction,
        }
    }

    /// One column as a labelled [`TimeSeries`].
    ///
    /// Fails with [`AnalysisError::EmptySeries`] if the column has fewer than
    /// two valid values.
    pub fn series(&self, field: WeatherField) -> Result<TimeSeries> {
        let points = self
            .timestamps
            .iter()
            .copied()
            .zip(self.column(field).iter().copied());
        Ok(prepare_points(points)?.with_label(field.column_name()))
    }

    /// Rows with `from <= time <= to`.
    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> WeatherFrame {
        let start = self.timestamps.partition_point(|t| *t < from);
        let end = self.timestamps.partition_point(|t| *t <= to).max(start);
        let cut = |v: &Vec<f64>| v[start..end].to_vec();
        WeatherFrame {
            timestamps: self.timestamps[start..end].to_vec(),
            temperature: cut(&self.temperature),
            precipitation: cut(&self.precipitation),
            wind_speed: cut(&self.wind_speed),
            wind_gusts: cut(&self.wind_gusts),
            wind_direction: cut(&self.wind_direction),
        }
    }
}

/// Extract one weather variable from records as a prepared series.
pub fn weather_series(records: &[WeatherRecord], field: WeatherField) -> Result<TimeSeries> {
    WeatherFrame::from_records(records)?.series(field)
}
