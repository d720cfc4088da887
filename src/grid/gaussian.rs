use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::{GridPoint, ScanningMode};
use crate::{error::GribError, templates::GaussianGridDefinition};

/// Index arithmetic for a global regular Gaussian grid (GDT 40).
///
/// The grid is fully determined by `N`, the number of parallels between a
/// pole and the equator: 2N rows of latitudes near the Gauss-Legendre roots
/// and 4N equally spaced columns starting at 0 degrees. The latitude index
/// uses the arcsine-linearized approximation
/// `i = floor((1 - asin(sin(lat)) / (pi/2)) * N)`; points are reconstructed
/// with the half-offset inverse `lat(i) = 90 * (1 - (2i + 1) / 2N)`, which
/// stays within a cell of the true Gaussian abscissae.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaussianGridIndex {
    pub n: u32,
    pub scanning_mode: u8,
}

impl GaussianGridIndex {
    pub(crate) fn new(def: &GaussianGridDefinition) -> Result<Self, GribError> {
        ScanningMode::from_flags(def.scanning_mode)?;
        if def.n == 0 {
            return Err(GribError::Malformed(
                "Gaussian grid with zero parallels".to_owned(),
            ));
        }
        if def.nj != 2 * def.n || def.ni != 4 * def.n {
            return Err(GribError::Malformed(format!(
                "Gaussian grid {}x{} is not the global grid of N = {}",
                def.ni, def.nj, def.n
            )));
        }
        Ok(Self {
            n: def.n,
            scanning_mode: def.scanning_mode,
        })
    }

    /// Grid shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (2 * self.n as usize, 4 * self.n as usize)
    }

    fn mode(&self) -> Result<ScanningMode, GribError> {
        ScanningMode::from_flags(self.scanning_mode)
    }

    fn lon_step(&self) -> f64 {
        360.0 / (4 * self.n) as f64
    }

    /// Locates the grid point nearest to `(lat, lon)`, in degrees.
    pub fn index_of(&self, lat: f64, lon: f64) -> Result<GridPoint, GribError> {
        let mode = self.mode()?;
        let (rows, cols) = self.shape();

        let fraction = 1.0 - lat.to_radians().sin().asin() / FRAC_PI_2;
        let from_north = (fraction * f64::from(self.n)) as i64;
        let from_north = from_north.clamp(0, rows as i64 - 1) as usize;
        let i = match mode {
            ScanningMode::NorthToSouth => from_north,
            ScanningMode::SouthToNorth => rows - 1 - from_north,
        };

        let step = self.lon_step();
        let lon = lon.rem_euclid(360.0);
        let j = ((lon + step / 2.0) / step) as usize % cols;

        Ok(GridPoint {
            i,
            j,
            n: i * cols + j,
        })
    }

    /// Coordinates of the grid point at row `i`, column `j`, in degrees.
    pub fn point_of(&self, i: usize, j: usize) -> Result<(f64, f64), GribError> {
        let mode = self.mode()?;
        let (rows, cols) = self.shape();
        if i >= rows {
            return Err(GribError::OutOfRange {
                index: i,
                len: rows,
            });
        }
        if j >= cols {
            return Err(GribError::OutOfRange {
                index: j,
                len: cols,
            });
        }
        let from_north = match mode {
            ScanningMode::NorthToSouth => i,
            ScanningMode::SouthToNorth => rows - 1 - i,
        };
        let lat = 90.0 * (1.0 - (2 * from_north + 1) as f64 / rows as f64);
        let lon = j as f64 * self.lon_step();
        Ok((lat, lon))
    }
}
