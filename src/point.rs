//! Random access to single grid point values. Samples are located by bit
//! offset arithmetic over the packed payload; the payload is never decoded
//! as a whole.

use crate::{
    bitstream::read_bits,
    decoders::unpack_sample,
    error::GribError,
    grid::{GridIndex, GridPoint},
    index::MessageIndex,
    message::Message,
    reader::ReadAt,
    templates::SimplePackingParam,
};

/// Reads single samples of one simple-packed message from a borrowed byte
/// source.
///
/// Because samples are a fixed `L` bits wide, the sample at linear index `n`
/// starts at bit `n * L` of the packed data; a read touches at most nine
/// octets. All methods take `&self` and are safe to call concurrently over
/// a shared read-only source.
pub struct PointReader<'s, R: ReadAt + ?Sized> {
    source: &'s R,
    grid: GridIndex,
    param: SimplePackingParam,
    num_values: u64,
    data_offset: u64,
}

impl<'s, R: ReadAt + ?Sized> PointReader<'s, R> {
    /// Builds a point reader from a loaded message index.
    ///
    /// Fails with [`GribError::UnsupportedPacking`] unless the message is
    /// simple-packed.
    pub fn new(source: &'s R, index: &MessageIndex) -> Result<Self, GribError> {
        let param = index.packing.simple_param()?;
        if param.nbit > 64 {
            return Err(GribError::WidthTooLarge(usize::from(param.nbit)));
        }
        Ok(Self {
            source,
            grid: index.scanning_mode.clone(),
            param,
            num_values: index.packing.vals,
            data_offset: index.data_offset,
        })
    }

    /// Builds a point reader directly from a scanned message.
    pub fn for_message(source: &'s R, message: &Message) -> Result<Self, GribError> {
        Self::new(source, &message.dump_index()?)
    }

    /// The grid mapping used to locate samples.
    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Reads the sample nearest to `(lat, lon)` and returns the grid cell's
    /// own coordinates along with the value.
    pub fn read_ll(&self, lat: f64, lon: f64) -> Result<(f64, f64, f64), GribError> {
        let GridPoint { i, j, n } = self.grid.index_of(lat, lon)?;
        let (grid_lat, grid_lon) = self.grid.point_of(i, j)?;
        let value = self.read_at(n)?;
        Ok((grid_lat, grid_lon, value))
    }

    /// Reads and unpacks the sample at linear index `n`.
    pub fn read_at(&self, n: usize) -> Result<f64, GribError> {
        if n as u64 >= self.num_values {
            return Err(GribError::OutOfRange {
                index: n,
                len: self.num_values as usize,
            });
        }
        let width = usize::from(self.param.nbit);
        if width == 0 {
            return Ok(unpack_sample(&self.param, 0));
        }

        let bit_offset = n * width;
        let first_octet = bit_offset / 8;
        let last_octet = (bit_offset + width).div_ceil(8);
        let mut buf = [0; 9];
        let span = &mut buf[..last_octet - first_octet];
        self.source
            .read_exact_at(span, self.data_offset + first_octet as u64)?;
        let encoded = read_bits(span, bit_offset - first_octet * 8, width)?;
        Ok(unpack_sample(&self.param, encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grid::LatLonGridIndex,
        index::{PackingContent, PackingIndex, SimplePackingContent},
        utils::as_grib_uint16,
    };

    /// A 3 x 4 ten-degree grid, rows north to south, 12-bit samples holding
    /// the values 0..12 scaled by E = -2, D = 1.
    fn fixture() -> (Vec<u8>, MessageIndex) {
        let width = 12_usize;
        let mut payload = vec![0_u8; (12 * width).div_ceil(8)];
        for n in 0_u64..12 {
            let x = n * 300;
            for bit in 0..width {
                let offset = n as usize * width + bit;
                if x >> (width - 1 - bit) & 1 == 1 {
                    payload[offset / 8] |= 0x80 >> (offset % 8);
                }
            }
        }
        let data_offset = 32_u64;
        let mut source = vec![0xee_u8; data_offset as usize];
        source.extend_from_slice(&payload);

        let index = MessageIndex {
            offset: 0,
            size: source.len() as u64,
            data_offset,
            scanning_mode: GridIndex::LatLon(LatLonGridIndex {
                ni: 4,
                nj: 3,
                latitude_of_first_grid_point: 20_000_000,
                longitude_of_first_grid_point: 10_000_000,
                resolution_and_component_flags: 0,
                latitude_of_last_grid_point: 0,
                longitude_of_last_grid_point: 40_000_000,
                i_direction_increment: 10_000_000,
                j_direction_increment: 10_000_000,
            }),
            packing: PackingIndex {
                number: 0,
                vals: 12,
                content: PackingContent::Simple(SimplePackingContent {
                    r: 0.0,
                    b: as_grib_uint16(-2),
                    d: as_grib_uint16(1),
                    l: 12,
                    t: 0,
                }),
            },
        };
        (source, index)
    }

    fn expected_value(n: u64) -> f64 {
        (n * 300) as f64 * 2_f64.powi(-2) * 10_f64.powi(-1)
    }

    #[test]
    fn read_at_every_sample() {
        let (source, index) = fixture();
        let reader = PointReader::new(&source[..], &index).unwrap();
        for n in 0..12 {
            let value = reader.read_at(n as usize).unwrap();
            assert!((value - expected_value(n)).abs() < 1e-9);
        }
    }

    #[test]
    fn read_at_out_of_range() {
        let (source, index) = fixture();
        let reader = PointReader::new(&source[..], &index).unwrap();
        assert_eq!(
            reader.read_at(12),
            Err(GribError::OutOfRange { index: 12, len: 12 })
        );
    }

    #[test]
    fn read_ll_snaps_to_the_nearest_cell() {
        let (source, index) = fixture();
        let reader = PointReader::new(&source[..], &index).unwrap();
        // (11, 21.2) is nearest to the cell at row 1, column 1 -> n = 5
        let (lat, lon, value) = reader.read_ll(11.0, 21.2).unwrap();
        assert_eq!((lat, lon), (10.0, 20.0));
        assert!((value - expected_value(5)).abs() < 1e-9);
    }

    #[test]
    fn truncated_payload_is_end_of_stream() {
        let (source, index) = fixture();
        let reader = PointReader::new(&source[..source.len() - 1], &index).unwrap();
        assert_eq!(reader.read_at(11), Err(GribError::EndOfStream));
    }

    #[test]
    fn non_simple_packing_is_rejected() {
        let (source, mut index) = fixture();
        index.packing.number = 41;
        assert_eq!(
            PointReader::new(&source[..], &index).err(),
            Some(GribError::UnsupportedPacking(41))
        );
    }
}
