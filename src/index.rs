//! The compact, persistable descriptor of an indexed message. Loading an
//! index back gives the point reader everything it needs without re-scanning
//! the file.

use std::io;

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    error::{GribError, TemplateKind},
    grid::GridIndex,
    sections::ReprDefinition,
    templates::{ComplexPackingParam, ReprTemplate, SimplePackingParam, SpatialDiffParam},
    utils::{as_grib_uint16, GribInt},
};

/// Everything needed to read point values from one message: where it lives,
/// where its packed data starts, how its grid maps coordinates to sample
/// indices, and how samples are packed.
///
/// Serializes to stable JSON; unknown grid or packing tags fail to
/// deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageIndex {
    pub offset: u64,
    pub size: u64,
    pub data_offset: u64,
    pub scanning_mode: GridIndex,
    pub packing: PackingIndex,
}

impl MessageIndex {
    /// Writes the index as JSON.
    pub fn dump<W: io::Write>(&self, writer: W) -> Result<(), GribError> {
        serde_json::to_writer(writer, self).map_err(|e| GribError::Io(e.to_string()))
    }

    /// Reads an index back from JSON.
    pub fn load<R: io::Read>(reader: R) -> Result<Self, GribError> {
        serde_json::from_reader(reader)
            .map_err(|e| GribError::Malformed(format!("message index: {e}")))
    }
}

/// The packing descriptor of an indexed message: template number, template
/// content and the number of packed values.
#[derive(Debug, Clone, PartialEq)]
pub struct PackingIndex {
    pub number: u16,
    pub vals: u64,
    pub content: PackingContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PackingContent {
    /// DRT 0 and DRT 41 carry the same descriptor.
    Simple(SimplePackingContent),
    Complex(ComplexPackingContent),
    SpatialDiff(SpatialDiffContent),
}

/// Simple-packing descriptor in wire form: the binary and decimal scale
/// factors keep their sign-flag + magnitude encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplePackingContent {
    pub r: f32,
    pub b: u16,
    pub d: u16,
    pub l: u8,
    pub t: u8,
}

impl From<&SimplePackingParam> for SimplePackingContent {
    fn from(param: &SimplePackingParam) -> Self {
        Self {
            r: param.ref_val,
            b: as_grib_uint16(param.exp),
            d: as_grib_uint16(param.dig),
            l: param.nbit,
            t: param.value_type,
        }
    }
}

impl From<&SimplePackingContent> for SimplePackingParam {
    fn from(content: &SimplePackingContent) -> Self {
        Self {
            ref_val: content.r,
            exp: content.b.as_grib_int(),
            dig: content.d.as_grib_int(),
            nbit: content.l,
            value_type: content.t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexPackingContent {
    #[serde(flatten)]
    pub simple: SimplePackingContent,
    pub group_splitting_method: u8,
    pub missing_value_management: u8,
    pub primary_missing_value: u32,
    pub secondary_missing_value: u32,
    pub number_of_groups: u32,
    pub group_width_reference: u8,
    pub group_width_bits: u8,
    pub group_length_reference: u32,
    pub group_length_increment: u8,
    pub last_group_length: u32,
    pub group_length_bits: u8,
}

impl From<&ComplexPackingParam> for ComplexPackingContent {
    fn from(param: &ComplexPackingParam) -> Self {
        Self {
            simple: (&param.simple).into(),
            group_splitting_method: param.group_splitting_method,
            missing_value_management: param.missing_value_management,
            primary_missing_value: param.primary_missing_value,
            secondary_missing_value: param.secondary_missing_value,
            number_of_groups: param.num_groups,
            group_width_reference: param.group_width_reference,
            group_width_bits: param.group_width_nbit,
            group_length_reference: param.group_length_reference,
            group_length_increment: param.group_length_increment,
            last_group_length: param.last_group_length,
            group_length_bits: param.group_length_nbit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialDiffContent {
    #[serde(flatten)]
    pub complex: ComplexPackingContent,
    pub order_of_spatial_differencing: u8,
    pub extra_descriptor_octets: u8,
}

impl From<&SpatialDiffParam> for SpatialDiffContent {
    fn from(param: &SpatialDiffParam) -> Self {
        Self {
            complex: (&param.complex).into(),
            order_of_spatial_differencing: param.diff_order,
            extra_descriptor_octets: param.extra_descriptor_octets,
        }
    }
}

impl PackingIndex {
    pub(crate) fn from_repr(repr: &ReprDefinition) -> Result<Self, GribError> {
        let content = match &repr.template {
            ReprTemplate::Simple(param) | ReprTemplate::Png(param) => {
                PackingContent::Simple(param.into())
            }
            ReprTemplate::Complex(param) => PackingContent::Complex(param.into()),
            ReprTemplate::SpatialDiff(param) => PackingContent::SpatialDiff(param.into()),
            ReprTemplate::Missing => {
                return Err(GribError::UnsupportedTemplate(TemplateKind::DataRepr, 255));
            }
        };
        Ok(Self {
            number: repr.template_number,
            vals: u64::from(repr.num_values),
            content,
        })
    }

    /// The simple-packing parameters, required for point access.
    ///
    /// Only DRT 0 qualifies: fixed-width packed samples that can be located
    /// by bit offset.
    pub fn simple_param(&self) -> Result<SimplePackingParam, GribError> {
        match (&self.content, self.number) {
            (PackingContent::Simple(content), 0) => Ok(content.into()),
            _ => Err(GribError::UnsupportedPacking(self.number)),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PackingIndexRepr {
    number: u16,
    content: serde_json::Value,
    vals: u64,
}

impl Serialize for PackingIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let content = match &self.content {
            PackingContent::Simple(content) => serde_json::to_value(content),
            PackingContent::Complex(content) => serde_json::to_value(content),
            PackingContent::SpatialDiff(content) => serde_json::to_value(content),
        };
        PackingIndexRepr {
            number: self.number,
            content: content.map_err(ser::Error::custom)?,
            vals: self.vals,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackingIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = PackingIndexRepr::deserialize(deserializer)?;
        let content = match repr.number {
            0 | 41 => serde_json::from_value(repr.content).map(PackingContent::Simple),
            2 => serde_json::from_value(repr.content).map(PackingContent::Complex),
            3 => serde_json::from_value(repr.content).map(PackingContent::SpatialDiff),
            number => {
                return Err(de::Error::custom(format!(
                    "unknown packing template number {number}"
                )));
            }
        };
        Ok(Self {
            number: repr.number,
            vals: repr.vals,
            content: content.map_err(de::Error::custom)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LatLonGridIndex;

    fn simple_index() -> MessageIndex {
        MessageIndex {
            offset: 0,
            size: 203_278,
            data_offset: 175,
            scanning_mode: GridIndex::LatLon(LatLonGridIndex {
                ni: 1440,
                nj: 721,
                latitude_of_first_grid_point: 90_000_000,
                longitude_of_first_grid_point: 0,
                resolution_and_component_flags: 48,
                latitude_of_last_grid_point: -90_000_000,
                longitude_of_last_grid_point: 359_750_000,
                i_direction_increment: 250_000,
                j_direction_increment: 250_000,
            }),
            packing: PackingIndex {
                number: 0,
                vals: 1_038_240,
                content: PackingContent::Simple(SimplePackingContent {
                    r: 0.0194875,
                    b: as_grib_uint16(-18),
                    d: as_grib_uint16(-4),
                    l: 12,
                    t: 0,
                }),
            },
        }
    }

    #[test]
    fn json_shape_is_stable() {
        let value = serde_json::to_value(simple_index()).unwrap();
        assert_eq!(value["offset"], 0);
        assert_eq!(value["size"], 203_278);
        assert_eq!(value["data_offset"], 175);
        assert_eq!(value["scanning_mode"]["mode"], 0);
        assert_eq!(value["scanning_mode"]["content"]["ni"], 1440);
        assert_eq!(
            value["scanning_mode"]["content"]["latitudeOfFirstGridPoint"],
            90_000_000
        );
        assert_eq!(value["packing"]["number"], 0);
        assert_eq!(value["packing"]["vals"], 1_038_240);
        assert_eq!(value["packing"]["content"]["l"], 12);
        assert_eq!(value["packing"]["content"]["b"], 0x8012);
        assert_eq!(value["packing"]["content"]["d"], 0x8004);
    }

    #[test]
    fn json_round_trip() {
        let index = simple_index();
        let mut buf = Vec::new();
        index.dump(&mut buf).unwrap();
        let back = MessageIndex::load(&buf[..]).unwrap();
        assert_eq!(back, index);
    }

    #[test]
    fn simple_param_recovers_scale_factors() {
        let index = simple_index();
        let param = index.packing.simple_param().unwrap();
        assert_eq!(param.exp, -18);
        assert_eq!(param.dig, -4);
        assert_eq!(param.nbit, 12);
    }

    #[test]
    fn png_packing_does_not_allow_point_access() {
        let mut index = simple_index();
        index.packing.number = 41;
        assert_eq!(
            index.packing.simple_param(),
            Err(GribError::UnsupportedPacking(41))
        );
    }

    #[test]
    fn unknown_packing_number_fails_to_deserialize() {
        let json = r#"{"number": 200, "content": {}, "vals": 10}"#;
        assert!(serde_json::from_str::<PackingIndex>(json).is_err());
    }

    #[test]
    fn spatial_diff_content_round_trip() {
        let param = SpatialDiffParam {
            complex: ComplexPackingParam {
                simple: SimplePackingParam {
                    ref_val: 1.0,
                    exp: -2,
                    dig: 1,
                    nbit: 15,
                    value_type: 0,
                },
                group_splitting_method: 1,
                missing_value_management: 0,
                primary_missing_value: u32::MAX,
                secondary_missing_value: u32::MAX,
                num_groups: 731,
                group_width_reference: 4,
                group_width_nbit: 5,
                group_length_reference: 19,
                group_length_increment: 1,
                last_group_length: 37,
                group_length_nbit: 7,
            },
            diff_order: 2,
            extra_descriptor_octets: 3,
        };
        let index = PackingIndex {
            number: 3,
            vals: 1000,
            content: PackingContent::SpatialDiff((&param).into()),
        };
        let json = serde_json::to_string(&index).unwrap();
        let back: PackingIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);

        let value = serde_json::to_value(&index).unwrap();
        assert_eq!(value["content"]["numberOfGroups"], 731);
        assert_eq!(value["content"]["orderOfSpatialDifferencing"], 2);
        assert_eq!(value["content"]["r"], 1.0);
    }
}
