use std::io::Cursor;

use log::warn;

use crate::{
    bitstream::{BitReader, NBitValues},
    decoders::simple::SimplePackingDecodeIterator,
    error::GribError,
    templates::SimplePackingParam,
};

/// Unpacks a DRT 41 payload: the packed samples are the pixels of a PNG
/// image in raster order, fed through the simple-packing transform.
pub(crate) fn decode_values(
    param: &SimplePackingParam,
    payload: &[u8],
    num_values: usize,
) -> Result<Vec<f64>, GribError> {
    let buf = read_image_buffer(payload)
        .map_err(|e| GribError::Malformed(format!("PNG code stream: {e}")))?;

    if param.nbit != 16 {
        warn!(
            "PNG-packed data with {} bits per value is not well tested",
            param.nbit
        );
    }

    let reader = BitReader::new(Cursor::new(&buf));
    let bits = NBitValues::new(reader, usize::from(param.nbit), num_values);
    let values = SimplePackingDecodeIterator::new(bits, param).collect::<Vec<_>>();
    if values.len() != num_values {
        return Err(GribError::Malformed(format!(
            "PNG image holds {} samples, expected {num_values}",
            values.len()
        )));
    }
    Ok(values)
}

fn read_image_buffer(buf: &[u8]) -> Result<Vec<u8>, png::DecodingError> {
    let reader = Cursor::new(buf);
    let decoder = png::Decoder::new(reader);
    let mut reader = decoder.read_info()?;
    let out_size = reader
        .output_buffer_size()
        .ok_or(png::DecodingError::LimitsExceeded)?;
    let mut out_buf = vec![0; out_size];
    let info = reader.next_frame(&mut out_buf)?;
    out_buf.truncate(info.buffer_size());
    Ok(out_buf)
}
