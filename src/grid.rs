//! Bidirectional mapping between geographic coordinates and linear sample
//! indices, honoring the scanning-mode flags of the grid definition.

mod gaussian;
mod latlon;

pub use self::{gaussian::GaussianGridIndex, latlon::LatLonGridIndex};

use num_enum::TryFromPrimitive;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    error::{GribError, TemplateKind},
    templates::GridTemplate,
};

/// Scanning modes supported by this crate (GRIB2 flag table 3.4, as a
/// closed set). Any other flag combination is rejected with
/// [`GribError::UnsupportedScanMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum ScanningMode {
    /// `+i`, `-j`: west to east within a row, rows from north to south.
    NorthToSouth = 0,
    /// `+i`, `+j`: west to east within a row, rows from south to north.
    SouthToNorth = 64,
}

impl ScanningMode {
    pub(crate) fn from_flags(flags: u8) -> Result<Self, GribError> {
        Self::try_from(flags).map_err(|_| GribError::UnsupportedScanMode(flags))
    }
}

/// A grid point located by [`GridIndex::index_of`]: its row `i`, column `j`
/// and linear sample index `n` in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPoint {
    pub i: usize,
    pub j: usize,
    pub n: usize,
}

/// The lat/lon to sample-index mapping of one message's grid.
///
/// Values round-trip through the stable JSON form
/// `{"mode": <grid template number>, "content": {...}}`; unknown modes fail
/// to deserialize.
#[derive(Debug, Clone, PartialEq)]
pub enum GridIndex {
    LatLon(LatLonGridIndex),
    Gaussian(GaussianGridIndex),
}

impl GridIndex {
    pub(crate) fn from_template(template: &GridTemplate) -> Result<Self, GribError> {
        match template {
            GridTemplate::LatLon(def) => Ok(Self::LatLon(LatLonGridIndex::new(def)?)),
            GridTemplate::Gaussian(def) => Ok(Self::Gaussian(GaussianGridIndex::new(def)?)),
            GridTemplate::Missing => {
                Err(GribError::UnsupportedTemplate(TemplateKind::Grid, 255))
            }
        }
    }

    /// Locates the grid point nearest to `(lat, lon)`, in degrees.
    pub fn index_of(&self, lat: f64, lon: f64) -> Result<GridPoint, GribError> {
        match self {
            Self::LatLon(grid) => grid.index_of(lat, lon),
            Self::Gaussian(grid) => grid.index_of(lat, lon),
        }
    }

    /// Coordinates of the grid point at row `i`, column `j`, in degrees.
    pub fn point_of(&self, i: usize, j: usize) -> Result<(f64, f64), GribError> {
        match self {
            Self::LatLon(grid) => grid.point_of(i, j),
            Self::Gaussian(grid) => grid.point_of(i, j),
        }
    }

    /// Coordinates of the grid point at linear sample index `n`.
    pub fn point_at(&self, n: usize) -> Result<(f64, f64), GribError> {
        let (rows, cols) = self.shape();
        if n >= rows * cols {
            return Err(GribError::OutOfRange {
                index: n,
                len: rows * cols,
            });
        }
        self.point_of(n / cols, n % cols)
    }

    /// The grid shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::LatLon(grid) => grid.shape(),
            Self::Gaussian(grid) => grid.shape(),
        }
    }

    /// Total number of grid points.
    pub fn num_points(&self) -> usize {
        let (rows, cols) = self.shape();
        rows * cols
    }
}

#[derive(Serialize, Deserialize)]
struct GridIndexRepr {
    mode: u16,
    content: serde_json::Value,
}

impl Serialize for GridIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (mode, content) = match self {
            Self::LatLon(grid) => (0, serde_json::to_value(grid)),
            Self::Gaussian(grid) => (40, serde_json::to_value(grid)),
        };
        let content = content.map_err(ser::Error::custom)?;
        GridIndexRepr { mode, content }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GridIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = GridIndexRepr::deserialize(deserializer)?;
        match repr.mode {
            0 => serde_json::from_value(repr.content)
                .map(Self::LatLon)
                .map_err(de::Error::custom),
            40 => serde_json::from_value(repr.content)
                .map(Self::Gaussian)
                .map_err(de::Error::custom),
            mode => Err(de::Error::custom(format!(
                "unknown grid index mode {mode}"
            ))),
        }
    }
}

/// Rounds `progress` along an axis to the nearest step index, adding a
/// half-step before the integer divide so the nearest grid point wins.
pub(crate) fn nearest_step(progress: i64, step: i64) -> i64 {
    (progress + step / 2).div_euclid(step)
}

/// Checks a computed axis index against the axis length. A query before the
/// first point is reported with `index == len` so that the offending index
/// is never mistaken for a valid one.
pub(crate) fn grid_coord(value: i64, len: usize) -> Result<usize, GribError> {
    if (0..len as i64).contains(&value) {
        Ok(value as usize)
    } else {
        Err(GribError::OutOfRange {
            index: if value < 0 { len } else { value as usize },
            len,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanning_mode_flags() {
        assert_eq!(ScanningMode::from_flags(0), Ok(ScanningMode::NorthToSouth));
        assert_eq!(ScanningMode::from_flags(64), Ok(ScanningMode::SouthToNorth));
        assert_eq!(
            ScanningMode::from_flags(0b00010000),
            Err(GribError::UnsupportedScanMode(0b00010000))
        );
        assert_eq!(
            ScanningMode::from_flags(0b10000000),
            Err(GribError::UnsupportedScanMode(0b10000000))
        );
    }

    #[test]
    fn nearest_step_rounds_to_nearest() {
        assert_eq!(nearest_step(0, 250_000), 0);
        assert_eq!(nearest_step(100_000, 250_000), 0);
        assert_eq!(nearest_step(125_000, 250_000), 1);
        assert_eq!(nearest_step(90_000_000, 250_000), 360);
        assert_eq!(nearest_step(-100_000, 250_000), 0);
        assert_eq!(nearest_step(-130_000, 250_000), -1);
    }

    #[test]
    fn unknown_mode_fails_to_deserialize() {
        let err = serde_json::from_str::<GridIndex>(r#"{"mode": 90, "content": {}}"#);
        assert!(err.is_err());
    }
}
