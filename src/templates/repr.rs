use crate::{
    error::{GribError, TemplateKind},
    utils::{read_as, GribInt},
};

/// Data Representation Template 5.0: grid point data, simple packing.
///
/// A packed sample `X` decodes to `(R + X * 2^E) * 10^-D`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplePackingParam {
    /// Reference value `R` (IEEE 754 binary32).
    pub ref_val: f32,
    /// Binary scale factor `E`.
    pub exp: i16,
    /// Decimal scale factor `D`.
    pub dig: i16,
    /// Number of bits per packed value.
    pub nbit: u8,
    /// Type of original field values (0: floating point, 1: integer).
    pub value_type: u8,
}

const SIMPLE_PARAM_SIZE: usize = 10;

impl SimplePackingParam {
    pub(crate) fn from_buf(buf: &[u8]) -> Self {
        Self {
            ref_val: read_as!(f32, buf, 0),
            exp: read_as!(u16, buf, 4).as_grib_int(),
            dig: read_as!(u16, buf, 6).as_grib_int(),
            nbit: buf[8],
            value_type: buf[9],
        }
    }
}

/// Data Representation Template 5.2 descriptor: grid point data, complex
/// packing. The group payload itself is not reconstructed here.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexPackingParam {
    pub simple: SimplePackingParam,
    pub group_splitting_method: u8,
    pub missing_value_management: u8,
    pub primary_missing_value: u32,
    pub secondary_missing_value: u32,
    pub num_groups: u32,
    pub group_width_reference: u8,
    pub group_width_nbit: u8,
    pub group_length_reference: u32,
    pub group_length_increment: u8,
    pub last_group_length: u32,
    pub group_length_nbit: u8,
}

const COMPLEX_PARAM_SIZE: usize = 36;

impl ComplexPackingParam {
    pub(crate) fn from_buf(buf: &[u8]) -> Self {
        Self {
            simple: SimplePackingParam::from_buf(buf),
            group_splitting_method: buf[10],
            missing_value_management: buf[11],
            primary_missing_value: read_as!(u32, buf, 12),
            secondary_missing_value: read_as!(u32, buf, 16),
            num_groups: read_as!(u32, buf, 20),
            group_width_reference: buf[24],
            group_width_nbit: buf[25],
            group_length_reference: read_as!(u32, buf, 26),
            group_length_increment: buf[30],
            last_group_length: read_as!(u32, buf, 31),
            group_length_nbit: buf[35],
        }
    }
}

/// Data Representation Template 5.3 descriptor: complex packing with spatial
/// differencing.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialDiffParam {
    pub complex: ComplexPackingParam,
    pub diff_order: u8,
    pub extra_descriptor_octets: u8,
}

const SPATIAL_DIFF_PARAM_SIZE: usize = 38;

impl SpatialDiffParam {
    pub(crate) fn from_buf(buf: &[u8]) -> Self {
        Self {
            complex: ComplexPackingParam::from_buf(buf),
            diff_order: buf[36],
            extra_descriptor_octets: buf[37],
        }
    }
}

/// Decoded Data Representation Template payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ReprTemplate {
    Simple(SimplePackingParam),
    Complex(ComplexPackingParam),
    SpatialDiff(SpatialDiffParam),
    /// Template 5.41: the descriptor of simple packing with the packed
    /// payload carried as a PNG image.
    Png(SimplePackingParam),
    Missing,
}

impl ReprTemplate {
    pub(crate) fn from_template(number: u16, buf: &[u8]) -> Result<Self, GribError> {
        let need = match number {
            0 | 41 => SIMPLE_PARAM_SIZE,
            2 => COMPLEX_PARAM_SIZE,
            3 => SPATIAL_DIFF_PARAM_SIZE,
            255 => return Ok(Self::Missing),
            _ => {
                return Err(GribError::UnsupportedTemplate(
                    TemplateKind::DataRepr,
                    number,
                ));
            }
        };
        if buf.len() < need {
            return Err(GribError::Malformed(format!(
                "data representation template {number} needs {need} octets, got {}",
                buf.len()
            )));
        }
        Ok(match number {
            0 => Self::Simple(SimplePackingParam::from_buf(buf)),
            2 => Self::Complex(ComplexPackingParam::from_buf(buf)),
            3 => Self::SpatialDiff(SpatialDiffParam::from_buf(buf)),
            _ => Self::Png(SimplePackingParam::from_buf(buf)),
        })
    }
}
