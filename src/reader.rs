//! Byte-source access and the length-prefixed section framing layer. No
//! section length is trusted before it has been checked against the bytes
//! actually available.

use std::io::{self, Read, Seek, SeekFrom};

use log::debug;

use crate::{
    error::GribError,
    sections::{
        DataSection, Indicator, SectionBody, SectionInfo, SECT0_MAGIC, SECT0_SIZE, SECT8_MAGIC,
        SECT8_SIZE, SECT_HEADER_SIZE,
    },
    utils::read_as,
};

/// Positioned reads from an immutable byte source.
///
/// Implemented for byte slices, which covers memory-mapped files since a map
/// dereferences to `[u8]`, and for plain files on Unix. Readers borrow the
/// source and never close it; the caller owns its lifetime.
pub trait ReadAt {
    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Fails with [`GribError::EndOfStream`] if the source ends first.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), GribError>;

    /// Total size of the source in bytes.
    fn size(&self) -> u64;
}

impl ReadAt for [u8] {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), GribError> {
        let start = usize::try_from(offset).map_err(|_| GribError::EndOfStream)?;
        let end = start.checked_add(buf.len()).ok_or(GribError::EndOfStream)?;
        if end > self.len() {
            return Err(GribError::EndOfStream);
        }
        buf.copy_from_slice(&self[start..end]);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), GribError> {
        (**self).read_exact_at(buf, offset)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

#[cfg(unix)]
impl ReadAt for std::fs::File {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), GribError> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset).map_err(GribError::from)
    }

    fn size(&self) -> u64 {
        self.metadata().map(|m| m.len()).unwrap_or(0)
    }
}

/// A framed section: its number, byte offset and total length, with the body
/// left untouched for a separate typed decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionFrame {
    pub num: u8,
    pub offset: u64,
    pub size: usize,
}

/// Frames the section starting at `offset` without reading its body.
///
/// Recognition rules, in order: the `7777` end-section magic (section 8,
/// 4 octets), the `GRIB` indicator magic (section 0, 16 octets), and
/// otherwise a 4-octet big-endian length followed by a section number in
/// 1..=7. An `offset` at or past the end of the source is a clean
/// [`GribError::EndOfFile`]; running out of bytes mid-frame is
/// [`GribError::EndOfStream`].
pub fn frame_at<R: ReadAt + ?Sized>(source: &R, offset: u64) -> Result<SectionFrame, GribError> {
    if offset >= source.size() {
        return Err(GribError::EndOfFile);
    }

    let mut magic = [0; 4];
    source.read_exact_at(&mut magic, offset)?;
    if magic == SECT8_MAGIC {
        return Ok(SectionFrame {
            num: 8,
            offset,
            size: SECT8_SIZE,
        });
    }
    if magic == SECT0_MAGIC {
        return Ok(SectionFrame {
            num: 0,
            offset,
            size: SECT0_SIZE,
        });
    }

    let mut head = [0; SECT_HEADER_SIZE];
    source.read_exact_at(&mut head, offset)?;
    let size = read_as!(u32, head, 0) as usize;
    let num = head[4];
    if !(1..=7).contains(&num) {
        return Err(GribError::Malformed(format!(
            "invalid section number {num} at offset {offset}"
        )));
    }
    if size < SECT_HEADER_SIZE {
        return Err(GribError::Malformed(format!(
            "section {num} length {size} is smaller than its header"
        )));
    }
    if offset + size as u64 > source.size() {
        return Err(GribError::EndOfStream);
    }
    Ok(SectionFrame { num, offset, size })
}

/// Iterator over section frames starting at a byte offset, ending after the
/// section 8 frame has been yielded.
pub struct SectionFrames<'a, R: ?Sized> {
    source: &'a R,
    offset: u64,
    done: bool,
}

impl<'a, R: ReadAt + ?Sized> SectionFrames<'a, R> {
    pub fn new(source: &'a R, offset: u64) -> Self {
        Self {
            source,
            offset,
            done: false,
        }
    }
}

impl<R: ReadAt + ?Sized> Iterator for SectionFrames<'_, R> {
    type Item = Result<SectionFrame, GribError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match frame_at(self.source, self.offset) {
            Ok(frame) => {
                self.offset += frame.size as u64;
                if frame.num == 8 {
                    self.done = true;
                }
                Some(Ok(frame))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Sequential scanning of GRIB2 messages from a byte stream.
pub trait Grib2Read: Read + Seek {
    /// Scans the message starting at `offset` and returns its section table,
    /// with fixed parts bound for sections 0-6 and the packed payload of
    /// section 7 left unread.
    ///
    /// A clean end of input at the message boundary is
    /// [`GribError::EndOfFile`]; anything shorter than a complete message is
    /// an error and no partial table is returned.
    fn scan_message(&mut self, offset: usize) -> Result<Vec<SectionInfo>, GribError>;
}

/// A [`Grib2Read`] implementation over any `Read + Seek` source.
pub struct SeekableGrib2Reader<R> {
    reader: R,
}

impl<R> SeekableGrib2Reader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> Read for SeekableGrib2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<S: Seek> Seek for SeekableGrib2Reader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl<R: Read + Seek> Grib2Read for SeekableGrib2Reader<R> {
    fn scan_message(&mut self, offset: usize) -> Result<Vec<SectionInfo>, GribError> {
        self.seek(SeekFrom::Start(offset as u64))?;

        let mut buf = [0; SECT0_SIZE];
        read_exact_or_clean_eof(self, &mut buf)?;
        let indicator = Indicator::from_slice(&buf)?;
        let whole_size = indicator.total_length as usize;
        debug!("scanning message at {offset}, {whole_size} octets");

        let mut sects = vec![SectionInfo {
            num: 0,
            offset,
            size: SECT0_SIZE,
            body: Some(SectionBody::Section0(indicator)),
        }];
        let mut rest_size = whole_size - SECT0_SIZE;

        loop {
            if rest_size == SECT8_SIZE {
                let mut buf = [0; SECT8_SIZE];
                self.read_exact(&mut buf).map_err(GribError::from)?;
                if buf != SECT8_MAGIC {
                    return Err(GribError::Malformed(
                        "content of the end section is not valid".to_owned(),
                    ));
                }
                sects.push(SectionInfo {
                    num: 8,
                    offset: offset + whole_size - SECT8_SIZE,
                    size: SECT8_SIZE,
                    body: Some(SectionBody::Section8),
                });
                break;
            }
            if rest_size < SECT8_SIZE + SECT_HEADER_SIZE {
                return Err(GribError::Malformed(format!(
                    "{rest_size} octets left over before the end section"
                )));
            }

            let mut head = [0; SECT_HEADER_SIZE];
            self.read_exact(&mut head).map_err(GribError::from)?;
            let sect_size = read_as!(u32, head, 0) as usize;
            let sect_num = head[4];
            let sect_offset = offset + whole_size - rest_size;
            debug!("section {sect_num} at {sect_offset}: {sect_size} octets");
            if !(1..=7).contains(&sect_num) {
                return Err(GribError::Malformed(format!(
                    "invalid section number {sect_num} at offset {sect_offset}"
                )));
            }
            if sect_size < SECT_HEADER_SIZE || sect_size > rest_size - SECT8_SIZE {
                return Err(GribError::Malformed(format!(
                    "section {sect_num} length {sect_size} overflows the message"
                )));
            }

            let body_size = sect_size - SECT_HEADER_SIZE;
            let body = if sect_num == 7 {
                // The packed payload is skipped, not materialized; only its
                // span is remembered.
                self.seek(SeekFrom::Current(body_size as i64))?;
                SectionBody::Section7(DataSection {
                    data_offset: sect_offset + SECT_HEADER_SIZE,
                    data_size: body_size,
                })
            } else {
                let mut body = vec![0; body_size];
                self.read_exact(&mut body).map_err(GribError::from)?;
                SectionBody::from_body(sect_num, &body)?
            };
            sects.push(SectionInfo {
                num: sect_num,
                offset: sect_offset,
                size: sect_size,
                body: Some(body),
            });
            rest_size -= sect_size;
        }

        Ok(sects)
    }
}

/// Reads `buf.len()` bytes, mapping an immediate end of input to the clean
/// [`GribError::EndOfFile`] and a partial read to [`GribError::EndOfStream`].
fn read_exact_or_clean_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), GribError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Err(GribError::EndOfFile),
            Ok(0) => return Err(GribError::EndOfStream),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(GribError::from(e)),
        }
    }
    Ok(())
}
