//! Unpacking of section 7 payloads into physical values. Payload bytes are
//! read on demand; nothing is materialized while scanning or indexing.

mod simple;

#[cfg(feature = "png-unpack-with-png-crate")]
mod png;

pub(crate) use self::simple::unpack_sample;
use self::simple::{FixedValueIterator, SimplePackingDecodeIterator};

use std::io::Cursor;

use log::warn;

use crate::{
    bitstream::{BitReader, NBitValues},
    error::GribError,
    message::Message,
    reader::ReadAt,
    templates::{ReprTemplate, SimplePackingParam},
};

/// Sequentially unpacks all samples of a message into 64-bit floats.
///
/// Only simple packing (DRT 0) and, when the corresponding feature is
/// enabled, PNG packing (DRT 41) reconstruct values; other representations
/// fail with [`GribError::UnsupportedPacking`]. A message to which a bitmap
/// applies is likewise rejected, since its samples no longer map one to one
/// onto grid points.
pub fn decode_values<R: ReadAt + ?Sized>(
    source: &R,
    message: &Message,
) -> Result<Box<[f64]>, GribError> {
    let repr = message.repr_definition();
    if message.has_bitmap() {
        return Err(GribError::UnsupportedPacking(repr.template_number));
    }
    let num_values = repr.num_values as usize;

    match &repr.template {
        ReprTemplate::Simple(param) => {
            check_value_type(param);
            if param.nbit > 64 {
                return Err(GribError::WidthTooLarge(usize::from(param.nbit)));
            }
            if param.nbit == 0 {
                let values = FixedValueIterator::new(unpack_sample(param, 0), num_values)
                    .collect::<Vec<_>>();
                return Ok(values.into_boxed_slice());
            }
            let payload = read_payload(source, message)?;
            let needed_bits = num_values * usize::from(param.nbit);
            if needed_bits > payload.len() * 8 {
                return Err(GribError::Malformed(format!(
                    "packed payload of {} octets cannot hold {num_values} samples",
                    payload.len()
                )));
            }
            let reader = BitReader::new(Cursor::new(payload));
            let bits = NBitValues::new(reader, usize::from(param.nbit), num_values);
            let values = SimplePackingDecodeIterator::new(bits, param).collect::<Vec<_>>();
            Ok(values.into_boxed_slice())
        }
        #[cfg(feature = "png-unpack-with-png-crate")]
        ReprTemplate::Png(param) => {
            check_value_type(param);
            let payload = read_payload(source, message)?;
            let values = png::decode_values(param, &payload, num_values)?;
            Ok(values.into_boxed_slice())
        }
        _ => Err(GribError::UnsupportedPacking(repr.template_number)),
    }
}

fn read_payload<R: ReadAt + ?Sized>(
    source: &R,
    message: &Message,
) -> Result<Vec<u8>, GribError> {
    let data = message.data_section();
    let mut payload = vec![0; data.data_size];
    source.read_exact_at(&mut payload, data.data_offset as u64)?;
    Ok(payload)
}

fn check_value_type(param: &SimplePackingParam) {
    if param.value_type != 0 {
        warn!(
            "original field values of type {} are unpacked as floating point",
            param.value_type
        );
    }
}
