//! Typed records for the fixed parts of sections 0-8. Binding is big-endian
//! deserialization of each section's bytes after the common 5-octet
//! `(length, number)` prefix; trailing bytes are preserved verbatim.

use chrono::{DateTime, LocalResult, TimeZone, Utc};

use crate::{
    error::GribError,
    templates::{GridTemplate, ProductTemplate, ReprTemplate},
    utils::read_as,
};

pub(crate) const SECT0_MAGIC: &[u8] = b"GRIB";
pub(crate) const SECT0_SIZE: usize = 16;
pub(crate) const SECT_HEADER_SIZE: usize = 5;
pub(crate) const SECT8_MAGIC: &[u8] = b"7777";
pub(crate) const SECT8_SIZE: usize = 4;

/// One framed section of a message: its number, byte offset into the source
/// and total size, with the decoded fixed part attached for sections 0-6.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionInfo {
    pub num: u8,
    pub offset: usize,
    pub size: usize,
    pub body: Option<SectionBody>,
}

/// Decoded fixed part of one section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    Section0(Indicator),
    Section1(Identification),
    Section2(LocalUse),
    Section3(GridDefinition),
    Section4(ProdDefinition),
    Section5(ReprDefinition),
    Section6(BitMap),
    Section7(DataSection),
    Section8,
}

impl SectionBody {
    /// Binds the body of sections 1-6 from the bytes following the common
    /// 5-octet prefix.
    pub(crate) fn from_body(num: u8, body: &[u8]) -> Result<Self, GribError> {
        match num {
            1 => Ok(Self::Section1(Identification::from_body(body)?)),
            2 => Ok(Self::Section2(LocalUse::from_body(body))),
            3 => Ok(Self::Section3(GridDefinition::from_body(body)?)),
            4 => Ok(Self::Section4(ProdDefinition::from_body(body)?)),
            5 => Ok(Self::Section5(ReprDefinition::from_body(body)?)),
            6 => Ok(Self::Section6(BitMap::from_body(body)?)),
            _ => Err(GribError::Malformed(format!(
                "no body binder for section {num}"
            ))),
        }
    }
}

/// Section 0: indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Indicator {
    /// Discipline - GRIB Master Table Number (Code Table 0.0).
    pub discipline: u8,
    /// Total length of the GRIB message in octets, including Section 0.
    pub total_length: u64,
}

impl Indicator {
    pub(crate) fn from_slice(slice: &[u8]) -> Result<Self, GribError> {
        if slice.len() < SECT0_SIZE {
            return Err(GribError::EndOfStream);
        }
        if &slice[0..SECT0_MAGIC.len()] != SECT0_MAGIC {
            return Err(GribError::Malformed("not GRIB data".to_owned()));
        }
        let discipline = slice[6];
        let edition = slice[7];
        if edition != 2 {
            return Err(GribError::UnsupportedEdition(edition));
        }
        let total_length = read_as!(u64, slice, 8);
        if (total_length as usize) < SECT0_SIZE + SECT8_SIZE {
            return Err(GribError::Malformed(format!(
                "total message length {total_length} is too small"
            )));
        }
        Ok(Self {
            discipline,
            total_length,
        })
    }
}

/// Section 1: identification of the originating centre and reference time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identification {
    pub centre_id: u16,
    pub subcentre_id: u16,
    pub master_table_version: u8,
    pub local_table_version: u8,
    pub ref_time_significance: u8,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub prod_status: u8,
    pub data_type: u8,
    /// Reserved octets beyond the fixed part, preserved verbatim.
    pub reserved: Box<[u8]>,
}

impl Identification {
    fn from_body(body: &[u8]) -> Result<Self, GribError> {
        if body.len() < 16 {
            return Err(GribError::Malformed(format!(
                "section 1 body too short: {} octets",
                body.len()
            )));
        }
        Ok(Self {
            centre_id: read_as!(u16, body, 0),
            subcentre_id: read_as!(u16, body, 2),
            master_table_version: body[4],
            local_table_version: body[5],
            ref_time_significance: body[6],
            year: read_as!(u16, body, 7),
            month: body[9],
            day: body[10],
            hour: body[11],
            minute: body[12],
            second: body[13],
            prod_status: body[14],
            data_type: body[15],
            reserved: body[16..].into(),
        })
    }

    /// Reference time of the data.
    pub fn ref_time(&self) -> Result<DateTime<Utc>, GribError> {
        let result = Utc.with_ymd_and_hms(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        );
        match result {
            LocalResult::Single(dt) => Ok(dt),
            _ => Err(GribError::Malformed(format!(
                "invalid reference time: {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.minute, self.second
            ))),
        }
    }
}

/// Section 2: local use, preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalUse {
    pub payload: Box<[u8]>,
}

impl LocalUse {
    fn from_body(body: &[u8]) -> Self {
        Self {
            payload: body.into(),
        }
    }
}

/// Section 3: grid definition.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDefinition {
    /// Source of grid definition (Code Table 3.0).
    pub source: u8,
    /// Number of data points.
    pub num_points: u32,
    /// Number of octets for an optional list of numbers of points.
    pub optional_list_size: u8,
    /// Interpretation of the optional list (Code Table 3.11).
    pub optional_list_interpretation: u8,
    /// Grid Definition Template Number.
    pub template_number: u16,
    pub template: GridTemplate,
}

impl GridDefinition {
    fn from_body(body: &[u8]) -> Result<Self, GribError> {
        if body.len() < 9 {
            return Err(GribError::Malformed(format!(
                "section 3 body too short: {} octets",
                body.len()
            )));
        }
        let optional_list_size = body[5];
        let template_number = read_as!(u16, body, 7);
        let template_end = body
            .len()
            .checked_sub(usize::from(optional_list_size))
            .filter(|end| *end >= 9)
            .ok_or_else(|| {
                GribError::Malformed("optional point-count list overflows section 3".to_owned())
            })?;
        let template = GridTemplate::from_template(template_number, &body[9..template_end])?;
        Ok(Self {
            source: body[0],
            num_points: read_as!(u32, body, 1),
            optional_list_size,
            optional_list_interpretation: body[6],
            template_number,
            template,
        })
    }
}

/// Section 4: product definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProdDefinition {
    /// Number of coordinate values after the template.
    pub num_coordinates: u16,
    /// Product Definition Template Number.
    pub template_number: u16,
    pub template: ProductTemplate,
    /// Optional coordinate values, preserved verbatim.
    pub coordinates: Box<[u8]>,
}

impl ProdDefinition {
    fn from_body(body: &[u8]) -> Result<Self, GribError> {
        if body.len() < 4 {
            return Err(GribError::Malformed(format!(
                "section 4 body too short: {} octets",
                body.len()
            )));
        }
        let num_coordinates = read_as!(u16, body, 0);
        let template_number = read_as!(u16, body, 2);
        let coordinates_size = usize::from(num_coordinates) * 4;
        let template_end = body
            .len()
            .checked_sub(coordinates_size)
            .filter(|end| *end >= 4)
            .ok_or_else(|| {
                GribError::Malformed("coordinate values overflow section 4".to_owned())
            })?;
        let template = ProductTemplate::from_template(template_number, &body[4..template_end])?;
        Ok(Self {
            num_coordinates,
            template_number,
            template,
            coordinates: body[template_end..].into(),
        })
    }
}

/// Section 5: data representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprDefinition {
    /// Number of data points to which the template applies.
    pub num_values: u32,
    /// Data Representation Template Number.
    pub template_number: u16,
    pub template: ReprTemplate,
}

impl ReprDefinition {
    fn from_body(body: &[u8]) -> Result<Self, GribError> {
        if body.len() < 6 {
            return Err(GribError::Malformed(format!(
                "section 5 body too short: {} octets",
                body.len()
            )));
        }
        let template_number = read_as!(u16, body, 4);
        Ok(Self {
            num_values: read_as!(u32, body, 0),
            template_number,
            template: ReprTemplate::from_template(template_number, &body[6..])?,
        })
    }
}

/// Section 6: bitmap. The indicator octet is authoritative; the body is
/// retained without expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitMap {
    /// Bitmap indicator (Code Table 6.0); 255 means no bitmap applies.
    pub indicator: u8,
    pub bitmap: Box<[u8]>,
}

impl BitMap {
    fn from_body(body: &[u8]) -> Result<Self, GribError> {
        if body.is_empty() {
            return Err(GribError::Malformed("section 6 body is empty".to_owned()));
        }
        Ok(Self {
            indicator: body[0],
            bitmap: body[1..].into(),
        })
    }
}

/// Section 7: the byte span of the packed payload. The payload itself is
/// never materialized during scanning; decoders read it on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataSection {
    /// Byte offset of the packed data within the source.
    pub data_offset: usize,
    /// Length of the packed data in octets.
    pub data_size: usize,
}
