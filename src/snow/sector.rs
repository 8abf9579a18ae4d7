//! Sixteen-point compass sectors.

use serde::{Deserialize, Serialize};

pub const SECTOR_COUNT: usize = 16;

/// Angular width of one sector in degrees.
pub const SECTOR_WIDTH: f64 = 360.0 / SECTOR_COUNT as f64;

pub const SECTOR_LABELS: [&str; SECTOR_COUNT] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Sector of a wind direction in degrees, sectors centred on the compass
/// points: `floor(((direction + 11.25) mod 360) / 22.5)`.
///
/// Returns `None` for non-finite directions.
pub fn sector_index(direction: f64) -> Option<usize> {
    if !direction.is_finite() {
        return None;
    }
    let shifted = (direction + SECTOR_WIDTH / 2.0).rem_euclid(360.0);
    Some(((shifted / SECTOR_WIDTH).floor() as usize).min(SECTOR_COUNT - 1))
}

/// Transport mass per compass sector, kg/m.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SectorTransport {
    pub values: [f64; SECTOR_COUNT],
}

impl SectorTransport {
    pub fn add(&mut self, direction: f64, amount: f64) -> bool {
        match sector_index(direction) {
            Some(i) => {
                self.values[i] += amount;
                true
            }
            None => false,
        }
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Centre angle of sector `i` in degrees.
    pub fn center_angle(i: usize) -> f64 {
        i as f64 * SECTOR_WIDTH
    }

    /// `(label, centre angle, value)` per sector, clockwise from north.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (SECTOR_LABELS[i], Self::center_angle(i), *v))
    }

    /// Element-wise arithmetic mean; the zero rose for an empty input.
    pub fn mean<'a, I>(roses: I) -> SectorTransport
    where
        I: IntoIterator<Item = &'a SectorTransport>,
    {
        let mut sum = SectorTransport::default();
        let mut count = 0usize;
        for rose in roses {
            for (s, v) in sum.values.iter_mut().zip(&rose.values) {
                *s += v;
            }
            count += 1;
        }
        if count > 0 {
            sum.values.iter_mut().for_each(|v| *v /= count as f64);
        }
        sum
    }

    /// The same rose in tonnes per metre.
    pub fn in_tonnes(&self) -> SectorTransport {
        SectorTransport {
            values: self.values.map(|v| v / 1000.0),
        }
    }
}
