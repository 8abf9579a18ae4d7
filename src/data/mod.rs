//! Boundary adapters from loosely typed tables to typed records.
//!
//! The data-loading layer hands over tables whose column names vary between
//! sources (`productionGroup`, `consumptionGroup` and `energyGroup` all name
//! the same field; weather columns may carry unit suffixes). Everything is
//! normalised here to one canonical name per field before any analysis runs.

mod records;
mod weather;

pub use records::{
    energy_groups, energy_series, filter_date_range, filter_year, mean_quantity_by_area,
    normalize_price_area, price_areas, AreaMean, CanonicalColumn, EnergyRecord, RawTable,
    WeatherRecord,
};
pub use weather::{weather_series, WeatherField, WeatherFrame};
