//! Energy and weather records and the column-name adapter.

use crate::core::TimeSeries;
use crate::error::{AnalysisError, Result};
use crate::prepare::{parse_timestamp, prepare_points, RawValue};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Canonical column names understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalColumn {
    StartTime,
    PriceArea,
    /// `productionGroup`, `consumptionGroup` and `energyGroup` all map here.
    EnergyGroup,
    QuantityKwh,
    Time,
    Temperature,
    Precipitation,
    WindSpeed,
    WindGusts,
    WindDirection,
}

impl CanonicalColumn {
    /// Map a source column name to its canonical column.
    ///
    /// Matching ignores case, surrounding whitespace and a trailing unit
    /// suffix such as ` (°C)`.
    pub fn from_name(name: &str) -> Option<Self> {
        let base = name.split('(').next().unwrap_or(name).trim().to_lowercase();
        let column = match base.as_str() {
            "starttime" => Self::StartTime,
            "pricearea" => Self::PriceArea,
            "energygroup" | "productiongroup" | "consumptiongroup" => Self::EnergyGroup,
            "quantitykwh" => Self::QuantityKwh,
            "time" | "date" | "datetime" => Self::Time,
            "temperature_2m" | "temperature" => Self::Temperature,
            "precipitation" => Self::Precipitation,
            "wind_speed_10m" | "windspeed_10m" | "wind_speed" => Self::WindSpeed,
            "wind_gusts_10m" | "wind_gusts" => Self::WindGusts,
            "wind_direction_10m" | "wind_direction" => Self::WindDirection,
            _ => return None,
        };
        Some(column)
    }

    /// The canonical field name.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::StartTime => "startTime",
            Self::PriceArea => "priceArea",
            Self::EnergyGroup => "energyGroup",
            Self::QuantityKwh => "quantityKwh",
            Self::Time => "time",
            Self::Temperature => "temperature_2m",
            Self::Precipitation => "precipitation",
            Self::WindSpeed => "wind_speed_10m",
            Self::WindGusts => "wind_gusts_10m",
            Self::WindDirection => "wind_direction_10m",
        }
    }
}

/// A loosely typed table: column names plus rows of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    /// Create a table, checking that every row matches the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawValue>>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(AnalysisError::DimensionMismatch {
                expected: columns.len(),
                got: row.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a canonical column, if any source column maps to it.
    pub fn position(&self, column: CanonicalColumn) -> Option<usize> {
        self.columns
            .iter()
            .position(|name| CanonicalColumn::from_name(name) == Some(column))
    }

    fn require(&self, column: CanonicalColumn) -> Result<usize> {
        self.position(column).ok_or_else(|| {
            AnalysisError::DataFormat(format!("missing column '{}'", column.canonical_name()))
        })
    }
}

/// Parse a timestamp cell.
fn cell_timestamp(cell: &RawValue) -> Option<DateTime<Utc>> {
    cell.as_text().and_then(parse_timestamp)
}

/// Normalise a price area label: `"NO 1"` becomes `"NO1"`.
pub fn normalize_price_area(area: &str) -> String {
    area.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// One hourly production or consumption record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyRecord {
    pub start_time: DateTime<Utc>,
    /// Normalised price area, e.g. `NO1`.
    pub price_area: String,
    /// Lower-case energy group, e.g. `hydro`.
    pub energy_group: String,
    /// NaN when the source value was not numeric.
    pub quantity_kwh: f64,
}

impl EnergyRecord {
    /// Build records from a raw production or consumption table.
    ///
    /// Rows with an unparseable `startTime` are dropped. Fails with
    /// [`AnalysisError::DataFormat`] if a required column is absent or no row
    /// survives.
    pub fn from_table(table: &RawTable) -> Result<Vec<EnergyRecord>> {
        let time_col = table.require(CanonicalColumn::StartTime)?;
        let area_col = table.require(CanonicalColumn::PriceArea)?;
        let group_col = table.require(CanonicalColumn::EnergyGroup)?;
        let qty_col = table.require(CanonicalColumn::QuantityKwh)?;

        let records: Vec<EnergyRecord> = table
            .rows()
            .iter()
            .filter_map(|row| {
                let start_time = cell_timestamp(&row[time_col])?;
                let price_area = normalize_price_area(row[area_col].as_text()?);
                let energy_group = row[group_col].as_text()?.trim().to_lowercase();
                Some(EnergyRecord {
                    start_time,
                    price_area,
                    energy_group,
                    quantity_kwh: row[qty_col].to_f64(),
                })
            })
            .collect();

        let dropped = table.len() - records.len();
        if dropped > 0 {
            debug!(dropped, total = table.len(), "dropped unparseable energy rows");
        }

        if records.is_empty() && !table.is_empty() {
            return Err(AnalysisError::DataFormat(
                "no energy row could be parsed".to_string(),
            ));
        }
        Ok(records)
    }
}

/// One hourly weather record from the archive API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub time: DateTime<Utc>,
    pub temperature_2m: f64,
    pub precipitation: f64,
    pub wind_speed_10m: f64,
    /// NaN when the source has no gust column.
    pub wind_gusts_10m: f64,
    pub wind_direction_10m: f64,
}

impl WeatherRecord {
    /// Build records from a raw weather table.
    ///
    /// The gust column is optional; every other field is required.
    pub fn from_table(table: &RawTable) -> Result<Vec<WeatherRecord>> {
        let time_col = table.require(CanonicalColumn::Time)?;
        let temp_col = table.require(CanonicalColumn::Temperature)?;
        let precip_col = table.require(CanonicalColumn::Precipitation)?;
        let speed_col = table.require(CanonicalColumn::WindSpeed)?;
        let dir_col = table.require(CanonicalColumn::WindDirection)?;
        let gust_col = table.position(CanonicalColumn::WindGusts);

        let records: Vec<WeatherRecord> = table
            .rows()
            .iter()
            .filter_map(|row| {
                Some(WeatherRecord {
                    time: cell_timestamp(&row[time_col])?,
                    temperature_2m: row[temp_col].to_f64(),
                    precipitation: row[precip_col].to_f64(),
                    wind_speed_10m: row[speed_col].to_f64(),
                    wind_gusts_10m: gust_col.map_or(f64::NAN, |c| row[c].to_f64()),
                    wind_direction_10m: row[dir_col].to_f64(),
                })
            })
            .collect();

        if records.is_empty() && !table.is_empty() {
            return Err(AnalysisError::DataFormat(
                "no weather row could be parsed".to_string(),
            ));
        }
        Ok(records)
    }
}

/// Mean quantity of one price area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaMean {
    pub price_area: String,
    pub mean_quantity_kwh: f64,
}

/// Mean `quantityKwh` per price area for one group over the trailing `days`.
///
/// The window ends at the latest record of the whole set and is inclusive on
/// both ends. Areas are returned in sorted order.
pub fn mean_quantity_by_area(records: &[EnergyRecord], group: &str, days: i64) -> Vec<AreaMean> {
    let Some(latest) = records.iter().map(|r| r.start_time).max() else {
        return Vec::new();
    };
    let earliest = latest - Duration::days(days);
    let group = group.trim().to_lowercase();

    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in records.iter().filter(|r| {
        r.energy_group == group
            && r.start_time >= earliest
            && r.start_time <= latest
            && r.quantity_kwh.is_finite()
    }) {
        let entry = sums.entry(r.price_area.as_str()).or_insert((0.0, 0));
        entry.0 += r.quantity_kwh;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(area, (sum, count))| AreaMean {
            price_area: area.to_string(),
            mean_quantity_kwh: sum / count as f64,
        })
        .collect()
}

/// Distinct energy groups, sorted.
pub fn energy_groups(records: &[EnergyRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.energy_group.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct price areas, sorted.
pub fn price_areas(records: &[EnergyRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.price_area.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Extract the quantity series for one price area and energy group.
///
/// Duplicate timestamps are averaged. Fails with [`AnalysisError::NoData`] if
/// no record matches.
pub fn energy_series(records: &[EnergyRecord], area: &str, group: &str) -> Result<TimeSeries> {
    let area = normalize_price_area(area);
    let group = group.trim().to_lowercase();

    let points: Vec<_> = records
        .iter()
        .filter(|r| r.price_area == area && r.energy_group == group)
        .map(|r| (r.start_time, r.quantity_kwh))
        .collect();

    if points.is_empty() {
        return Err(AnalysisError::NoData(format!(
            "no records for area '{area}' and group '{group}'"
        )));
    }

    Ok(prepare_points(points)?.with_label(CanonicalColumn::QuantityKwh.canonical_name()))
}

/// Restrict a series to whole days from `start` through `end`, inclusive.
pub fn filter_date_range(series: &TimeSeries, start: NaiveDate, end: NaiveDate) -> TimeSeries {
    let from = start.and_time(NaiveTime::MIN).and_utc();
    let to = end.and_time(NaiveTime::MIN).and_utc() + Duration::days(1)
        - Duration::nanoseconds(1);
    series.between(from, to)
}

/// Restrict a series to one calendar year.
pub fn filter_year(series: &TimeSeries, year: i32) -> TimeSeries {
    match (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) {
        (Some(start), Some(end)) => filter_date_range(series, start, end),
        _ => series.between(DateTime::<Utc>::MAX_UTC, DateTime::<Utc>::MIN_UTC),
    }
}
