use serde::{Deserialize, Serialize};

use super::{grid_coord, nearest_step, GridPoint, ScanningMode};
use crate::{error::GribError, templates::LatLonGridDefinition, utils::is_missing};

const DEGREE_UNITS: i64 = 1_000_000;
const FULL_CIRCLE: i64 = 360 * DEGREE_UNITS;

/// Index arithmetic for a regular latitude/longitude grid (GDT 0).
///
/// Angles are kept in the wire resolution of 10^-6 degree; the scan
/// direction along each axis is inferred from the first and last grid
/// points. Serializes to the stable `content` form of the message index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatLonGridIndex {
    pub ni: u32,
    pub nj: u32,
    pub latitude_of_first_grid_point: i32,
    pub longitude_of_first_grid_point: i32,
    pub resolution_and_component_flags: u8,
    pub latitude_of_last_grid_point: i32,
    pub longitude_of_last_grid_point: i32,
    pub i_direction_increment: u32,
    pub j_direction_increment: u32,
}

impl LatLonGridIndex {
    pub(crate) fn new(def: &LatLonGridDefinition) -> Result<Self, GribError> {
        let mode = ScanningMode::from_flags(def.scanning_mode)?;
        if def.i_direction_inc == 0
            || def.j_direction_inc == 0
            || is_missing(u64::from(def.i_direction_inc), 32)
            || is_missing(u64::from(def.j_direction_inc), 32)
        {
            return Err(GribError::Malformed(
                "lat/lon grid without explicit direction increments".to_owned(),
            ));
        }
        let lat_increases = def.last_point_lat > def.first_point_lat;
        let consistent = match mode {
            ScanningMode::NorthToSouth => !lat_increases,
            ScanningMode::SouthToNorth => def.last_point_lat >= def.first_point_lat,
        };
        if !consistent || def.last_point_lon < def.first_point_lon {
            return Err(GribError::Malformed(
                "first/last grid points are not consistent with the scanning mode".to_owned(),
            ));
        }
        Ok(Self {
            ni: def.ni,
            nj: def.nj,
            latitude_of_first_grid_point: def.first_point_lat,
            longitude_of_first_grid_point: def.first_point_lon,
            resolution_and_component_flags: def.resolution_and_component_flags,
            latitude_of_last_grid_point: def.last_point_lat,
            longitude_of_last_grid_point: def.last_point_lon,
            i_direction_increment: def.i_direction_inc,
            j_direction_increment: def.j_direction_inc,
        })
    }

    /// Grid shape as `(rows, cols)`, derived from the first/last points and
    /// the increments.
    pub fn shape(&self) -> (usize, usize) {
        let lat_span = i64::from(self.latitude_of_last_grid_point)
            .abs_diff(i64::from(self.latitude_of_first_grid_point));
        let lon_span = i64::from(self.longitude_of_last_grid_point)
            .abs_diff(i64::from(self.longitude_of_first_grid_point));
        let rows = lat_span / u64::from(self.j_direction_increment) + 1;
        let cols = lon_span / u64::from(self.i_direction_increment) + 1;
        (rows as usize, cols as usize)
    }

    fn lat_step(&self) -> i64 {
        let step = i64::from(self.j_direction_increment);
        if self.latitude_of_last_grid_point >= self.latitude_of_first_grid_point {
            step
        } else {
            -step
        }
    }

    fn lon_step(&self) -> i64 {
        i64::from(self.i_direction_increment)
    }

    /// Locates the grid point nearest to `(lat, lon)`, in degrees.
    pub fn index_of(&self, lat: f64, lon: f64) -> Result<GridPoint, GribError> {
        let (rows, cols) = self.shape();
        let lat_units = (lat * DEGREE_UNITS as f64).round() as i64;
        let mut lon_units = (lon * DEGREE_UNITS as f64).round() as i64;
        if self.longitude_of_first_grid_point >= 0 {
            lon_units = lon_units.rem_euclid(FULL_CIRCLE);
        }

        let lat_step = self.lat_step();
        let lat_progress =
            (lat_units - i64::from(self.latitude_of_first_grid_point)) * lat_step.signum();
        let i = grid_coord(nearest_step(lat_progress, lat_step.abs()), rows)?;

        let lon_progress = lon_units - i64::from(self.longitude_of_first_grid_point);
        let j = grid_coord(nearest_step(lon_progress, self.lon_step()), cols)?;

        Ok(GridPoint {
            i,
            j,
            n: i * cols + j,
        })
    }

    /// Coordinates of the grid point at row `i`, column `j`, in degrees.
    pub fn point_of(&self, i: usize, j: usize) -> Result<(f64, f64), GribError> {
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
        let lat = i64::from(self.latitude_of_first_grid_point) + i as i64 * self.lat_step();
        let lon = i64::from(self.longitude_of_first_grid_point) + j as i64 * self.lon_step();
        Ok((
            lat as f64 / DEGREE_UNITS as f64,
            lon as f64 / DEGREE_UNITS as f64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::test_helpers::{assert_almost_eq, lon_distance};

    /// 0.25-degree global grid: 721 x 1440, rows from north to south.
    fn global_quarter_degree() -> LatLonGridIndex {
        LatLonGridIndex {
            ni: 1440,
            nj: 721,
            latitude_of_first_grid_point: 90_000_000,
            longitude_of_first_grid_point: 0,
            resolution_and_component_flags: 48,
            latitude_of_last_grid_point: -90_000_000,
            longitude_of_last_grid_point: 359_750_000,
            i_direction_increment: 250_000,
            j_direction_increment: 250_000,
        }
    }

    #[test]
    fn shape_from_span_and_increments() {
        assert_eq!(global_quarter_degree().shape(), (721, 1440));
    }

    macro_rules! test_index_of {
        ($(($name:ident, $lat:expr, $lon:expr, $expected:expr),)*) => ($(
            #[test]
            fn $name() {
                let grid = global_quarter_degree();
                let point = grid.index_of($lat, $lon).unwrap();
                let (i, j, n) = $expected;
                assert_eq!(point, GridPoint { i, j, n });
            }
        )*);
    }

    test_index_of! {
        (index_of_north_west_corner, 90.0, 0.0, (0, 0, 0)),
        (index_of_equator_antimeridian, 0.0, 180.0, (360, 720, 519_120)),
        (index_of_south_east_corner, -90.0, 359.75, (720, 1439, 1_038_239)),
        (index_of_negative_longitude, 0.0, -180.0, (360, 720, 519_120)),
        (index_of_rounds_to_nearest, 40.1, 116.4, (200, 466, 288_466)),
    }

    #[test]
    fn point_of_beijing_cell() {
        let grid = global_quarter_degree();
        assert_eq!(grid.point_of(200, 466).unwrap(), (40.0, 116.5));
    }

    #[test]
    fn point_of_out_of_range() {
        let grid = global_quarter_degree();
        assert_eq!(
            grid.point_of(721, 0),
            Err(GribError::OutOfRange {
                index: 721,
                len: 721
            })
        );
    }

    #[test]
    fn index_of_beyond_pole_is_out_of_range() {
        let grid = LatLonGridIndex {
            ni: 35,
            nj: 6,
            latitude_of_first_grid_point: 60_000_000,
            longitude_of_first_grid_point: 10_000_000,
            resolution_and_component_flags: 48,
            latitude_of_last_grid_point: 10_000_000,
            longitude_of_last_grid_point: 350_000_000,
            i_direction_increment: 10_000_000,
            j_direction_increment: 10_000_000,
        };
        assert!(matches!(
            grid.index_of(75.1, 20.0),
            Err(GribError::OutOfRange { .. })
        ));
        assert!(matches!(
            grid.index_of(30.0, 355.1),
            Err(GribError::OutOfRange { .. })
        ));
    }

    #[test]
    fn south_to_north_rows() {
        let mut grid = global_quarter_degree();
        grid.latitude_of_first_grid_point = -90_000_000;
        grid.latitude_of_last_grid_point = 90_000_000;
        let point = grid.index_of(90.0, 0.0).unwrap();
        assert_eq!(point, GridPoint { i: 720, j: 0, n: 1_036_800 });
        assert_eq!(grid.point_of(0, 0).unwrap(), (-90.0, 0.0));
    }

    #[test]
    fn round_trip_is_within_half_a_step() {
        let grid = global_quarter_degree();
        let cities = [
            (39.9042, 116.4074),  // Beijing
            (51.5074, -0.1278),   // London
            (-33.8688, 151.2093), // Sydney
            (64.1466, -21.9426),  // Reykjavik
            (-0.1807, -78.4678),  // Quito
        ];
        for (lat, lon) in cities {
            let point = grid.index_of(lat, lon).unwrap();
            let (grid_lat, grid_lon) = grid.point_of(point.i, point.j).unwrap();
            assert_almost_eq!(grid_lat, lat, 0.125);
            assert!(lon_distance(grid_lon, lon) <= 0.125);
        }
    }

    #[test]
    fn rejects_inconsistent_scanning_mode() {
        use crate::templates::{GridTemplate, LatLonGridDefinition};

        let mut buf = vec![0_u8; 58];
        buf[16..20].copy_from_slice(&2_u32.to_be_bytes());
        buf[20..24].copy_from_slice(&2_u32.to_be_bytes());
        buf[32..36].copy_from_slice(&10_000_000_u32.to_be_bytes());
        buf[41..45].copy_from_slice(&20_000_000_u32.to_be_bytes());
        buf[45..49].copy_from_slice(&10_000_000_u32.to_be_bytes());
        buf[49..53].copy_from_slice(&10_000_000_u32.to_be_bytes());
        buf[53..57].copy_from_slice(&10_000_000_u32.to_be_bytes());
        buf[57] = 0; // north-to-south, but latitudes increase
        let GridTemplate::LatLon(def) = GridTemplate::from_template(0, &buf).unwrap() else {
            panic!("expected a lat/lon grid");
        };
        assert!(matches!(
            LatLonGridIndex::new(&def),
            Err(GribError::Malformed(_))
        ));

        let def = LatLonGridDefinition {
            scanning_mode: 64,
            ..def
        };
        assert!(LatLonGridIndex::new(&def).is_ok());
    }

    #[test]
    fn rejects_unsupported_scanning_mode() {
        use crate::templates::GridTemplate;

        let mut buf = vec![0_u8; 58];
        buf[49..53].copy_from_slice(&10_000_000_u32.to_be_bytes());
        buf[53..57].copy_from_slice(&10_000_000_u32.to_be_bytes());
        buf[57] = 0b00010000;
        let GridTemplate::LatLon(def) = GridTemplate::from_template(0, &buf).unwrap() else {
            panic!("expected a lat/lon grid");
        };
        assert_eq!(
            LatLonGridIndex::new(&def),
            Err(GribError::UnsupportedScanMode(0b00010000))
        );
    }

    #[test]
    fn serde_content_field_names() {
        let grid = global_quarter_degree();
        let value = serde_json::to_value(&grid).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "ni",
            "nj",
            "latitudeOfFirstGridPoint",
            "longitudeOfFirstGridPoint",
            "resolutionAndComponentFlags",
            "latitudeOfLastGridPoint",
            "longitudeOfLastGridPoint",
            "iDirectionIncrement",
            "jDirectionIncrement",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        let back: LatLonGridIndex = serde_json::from_value(value).unwrap();
        assert_eq!(back, grid);
    }
}
