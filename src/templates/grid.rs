use crate::{
    error::{GribError, TemplateKind},
    utils::{read_as, GribInt, ScaledValue},
};

/// Shape of the earth and its dimensions (GDT octets 15-30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EarthShape {
    pub shape: u8,
    pub spherical_radius: ScaledValue,
    pub major_axis: ScaledValue,
    pub minor_axis: ScaledValue,
}

impl EarthShape {
    fn from_buf(buf: &[u8]) -> Self {
        Self {
            shape: buf[0],
            spherical_radius: ScaledValue::from_buf(&buf[1..6]),
            major_axis: ScaledValue::from_buf(&buf[6..11]),
            minor_axis: ScaledValue::from_buf(&buf[11..16]),
        }
    }
}

/// Grid Definition Template 3.0: latitude/longitude, also called equidistant
/// cylindrical or Plate Carree. Angles are in units of 10^-6 degree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LatLonGridDefinition {
    pub earth: EarthShape,
    pub ni: u32,
    pub nj: u32,
    pub basic_angle: u32,
    pub basic_angle_subdivisions: u32,
    pub first_point_lat: i32,
    pub first_point_lon: i32,
    pub resolution_and_component_flags: u8,
    pub last_point_lat: i32,
    pub last_point_lon: i32,
    pub i_direction_inc: u32,
    pub j_direction_inc: u32,
    pub scanning_mode: u8,
}

impl LatLonGridDefinition {
    /// Returns the shape of the grid, i.e. a tuple of the number of grids in
    /// the i and j directions.
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.ni as usize, self.nj as usize)
    }

    /// Returns the grid type.
    pub fn short_name(&self) -> &'static str {
        "regular_ll"
    }

    pub(crate) fn from_buf(buf: &[u8]) -> Self {
        Self {
            earth: EarthShape::from_buf(&buf[0..16]),
            ni: read_as!(u32, buf, 16),
            nj: read_as!(u32, buf, 20),
            basic_angle: read_as!(u32, buf, 24),
            basic_angle_subdivisions: read_as!(u32, buf, 28),
            first_point_lat: read_as!(u32, buf, 32).as_grib_int(),
            first_point_lon: read_as!(u32, buf, 36).as_grib_int(),
            resolution_and_component_flags: buf[40],
            last_point_lat: read_as!(u32, buf, 41).as_grib_int(),
            last_point_lon: read_as!(u32, buf, 45).as_grib_int(),
            i_direction_inc: read_as!(u32, buf, 49),
            j_direction_inc: read_as!(u32, buf, 53),
            scanning_mode: buf[57],
        }
    }
}

/// Grid Definition Template 3.40: regular Gaussian. The layout matches
/// template 3.0 except that the number of parallels between a pole and the
/// equator takes the place of the j-direction increment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GaussianGridDefinition {
    pub earth: EarthShape,
    pub ni: u32,
    pub nj: u32,
    pub basic_angle: u32,
    pub basic_angle_subdivisions: u32,
    pub first_point_lat: i32,
    pub first_point_lon: i32,
    pub resolution_and_component_flags: u8,
    pub last_point_lat: i32,
    pub last_point_lon: i32,
    pub i_direction_inc: u32,
    pub n: u32,
    pub scanning_mode: u8,
}

impl GaussianGridDefinition {
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.ni as usize, self.nj as usize)
    }

    pub fn short_name(&self) -> &'static str {
        "regular_gg"
    }

    pub(crate) fn from_buf(buf: &[u8]) -> Self {
        Self {
            earth: EarthShape::from_buf(&buf[0..16]),
            ni: read_as!(u32, buf, 16),
            nj: read_as!(u32, buf, 20),
            basic_angle: read_as!(u32, buf, 24),
            basic_angle_subdivisions: read_as!(u32, buf, 28),
            first_point_lat: read_as!(u32, buf, 32).as_grib_int(),
            first_point_lon: read_as!(u32, buf, 36).as_grib_int(),
            resolution_and_component_flags: buf[40],
            last_point_lat: read_as!(u32, buf, 41).as_grib_int(),
            last_point_lon: read_as!(u32, buf, 45).as_grib_int(),
            i_direction_inc: read_as!(u32, buf, 49),
            n: read_as!(u32, buf, 53),
            scanning_mode: buf[57],
        }
    }
}

const GRID_TEMPLATE_FIXED_SIZE: usize = 58;

/// Decoded Grid Definition Template payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GridTemplate {
    LatLon(LatLonGridDefinition),
    Gaussian(GaussianGridDefinition),
    Missing,
}

impl GridTemplate {
    pub(crate) fn from_template(number: u16, buf: &[u8]) -> Result<Self, GribError> {
        match number {
            0 | 40 if buf.len() < GRID_TEMPLATE_FIXED_SIZE => Err(GribError::Malformed(format!(
                "grid definition template {number} needs {GRID_TEMPLATE_FIXED_SIZE} octets, got {}",
                buf.len()
            ))),
            0 => Ok(Self::LatLon(LatLonGridDefinition::from_buf(buf))),
            40 => Ok(Self::Gaussian(GaussianGridDefinition::from_buf(buf))),
            255 => Ok(Self::Missing),
            _ => Err(GribError::UnsupportedTemplate(TemplateKind::Grid, number)),
        }
    }
}
