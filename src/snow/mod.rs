//! Seasonal snow drift after Tabler (2003).
//!
//! Transport is accumulated per hydrological season (July 1 through June 30)
//! and, for the directional rose, per 22.5° compass sector. Sector totals use
//! the raw potential transport only; the wind/snowfall regime adjustment is
//! applied to the seasonal scalar and never to the sectors.

mod sector;
mod transport;

pub use sector::{sector_index, SectorTransport, SECTOR_COUNT, SECTOR_LABELS, SECTOR_WIDTH};
pub use transport::{
    hourly_potential_transport, hydrological_season, ControlRegime, SeasonTransport,
    SnowTransportModel, SnowTransportParams, SnowTransportReport,
};
