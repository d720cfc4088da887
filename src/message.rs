//! Assembly of framed sections into messages and iteration over a file.

use std::io::{Read, Seek};

use crate::{
    error::GribError,
    grid::{GridIndex, GridPoint},
    index::{MessageIndex, PackingIndex},
    reader::{frame_at, Grib2Read, ReadAt, SectionFrame, SeekableGrib2Reader},
    sections::{
        BitMap, DataSection, GridDefinition, Identification, Indicator, LocalUse, ProdDefinition,
        ReprDefinition, SectionBody, SectionInfo, SECT0_SIZE, SECT8_MAGIC, SECT8_SIZE,
        SECT_HEADER_SIZE,
    },
    templates::ReprTemplate,
};

/// One fully framed GRIB2 message. Immutable after construction; the packed
/// payload of section 7 stays in the underlying source and is referenced by
/// its byte span only.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    offset: usize,
    size: usize,
    indicator: Indicator,
    identification: Identification,
    local_use: Option<LocalUse>,
    grid_definition: GridDefinition,
    prod_definition: ProdDefinition,
    repr_definition: ReprDefinition,
    bitmap: Option<BitMap>,
    data: DataSection,
    frames: Box<[SectionFrame]>,
}

impl Message {
    /// Assembles a message from a scanned section table.
    pub(crate) fn from_sections(sections: Vec<SectionInfo>) -> Result<Self, GribError> {
        let mut indicator = None;
        let mut identification = None;
        let mut local_use = None;
        let mut grid_definition = None;
        let mut prod_definition = None;
        let mut repr_definition = None;
        let mut bitmap = None;
        let mut data = None;
        let mut end_seen = false;

        let offset = sections.first().map(|s| s.offset).unwrap_or(0);
        let mut frames = Vec::with_capacity(sections.len());
        for sect in sections {
            frames.push(SectionFrame {
                num: sect.num,
                offset: sect.offset as u64,
                size: sect.size,
            });
            match sect.body {
                Some(SectionBody::Section0(body)) => indicator = Some(body),
                Some(SectionBody::Section1(body)) => identification = Some(body),
                Some(SectionBody::Section2(body)) => local_use = Some(body),
                Some(SectionBody::Section3(body)) => grid_definition = Some(body),
                Some(SectionBody::Section4(body)) => prod_definition = Some(body),
                Some(SectionBody::Section5(body)) => repr_definition = Some(body),
                Some(SectionBody::Section6(body)) => bitmap = Some(body),
                Some(SectionBody::Section7(body)) => data = Some(body),
                Some(SectionBody::Section8) => end_seen = true,
                None => {}
            }
        }

        if !end_seen {
            return Err(missing_section(8));
        }
        let indicator = indicator.ok_or_else(|| missing_section(0))?;
        Ok(Self {
            offset,
            size: indicator.total_length as usize,
            indicator,
            identification: identification.ok_or_else(|| missing_section(1))?,
            local_use,
            grid_definition: grid_definition.ok_or_else(|| missing_section(3))?,
            prod_definition: prod_definition.ok_or_else(|| missing_section(4))?,
            repr_definition: repr_definition.ok_or_else(|| missing_section(5))?,
            bitmap,
            data: data.ok_or_else(|| missing_section(7))?,
            frames: frames.into_boxed_slice(),
        })
    }

    /// Byte offset of the message within its source.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total message length in octets, as reported by section 0.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte offset of the packed payload within the source.
    pub fn data_offset(&self) -> usize {
        self.data.data_offset
    }

    /// Discipline of the data (Code Table 0.0).
    pub fn discipline(&self) -> u8 {
        self.indicator.discipline
    }

    pub fn indicator(&self) -> &Indicator {
        &self.indicator
    }

    pub fn identification(&self) -> &Identification {
        &self.identification
    }

    pub fn local_use(&self) -> Option<&LocalUse> {
        self.local_use.as_ref()
    }

    pub fn grid_definition(&self) -> &GridDefinition {
        &self.grid_definition
    }

    pub fn prod_definition(&self) -> &ProdDefinition {
        &self.prod_definition
    }

    pub fn repr_definition(&self) -> &ReprDefinition {
        &self.repr_definition
    }

    /// The decoded Data Representation Template of section 5.
    pub fn data_representation_template(&self) -> &ReprTemplate {
        &self.repr_definition.template
    }

    pub fn bitmap(&self) -> Option<&BitMap> {
        self.bitmap.as_ref()
    }

    /// Whether a bitmap applies to the data (indicator other than 255).
    pub fn has_bitmap(&self) -> bool {
        self.bitmap.as_ref().is_some_and(|b| b.indicator != 255)
    }

    pub(crate) fn data_section(&self) -> &DataSection {
        &self.data
    }

    /// The raw section frame table in file order.
    pub fn sections(&self) -> &[SectionFrame] {
        &self.frames
    }

    /// Builds the lat/lon to sample-index mapping for this message's grid.
    pub fn scanning_mode(&self) -> Result<GridIndex, GribError> {
        GridIndex::from_template(&self.grid_definition.template)
    }

    /// Locates the grid point nearest to `(lat, lon)`, in degrees.
    pub fn grid_point_from_ll(&self, lat: f64, lon: f64) -> Result<GridPoint, GribError> {
        self.scanning_mode()?.index_of(lat, lon)
    }

    /// Coordinates of the grid point at linear sample index `n`.
    pub fn grid_point_at(&self, n: usize) -> Result<(f64, f64), GribError> {
        self.scanning_mode()?.point_at(n)
    }

    /// Dumps the compact descriptor that allows a later process to read
    /// point values without re-scanning the message.
    ///
    /// Messages to which a bitmap applies are rejected: their packed samples
    /// do not map one to one onto grid points.
    pub fn dump_index(&self) -> Result<MessageIndex, GribError> {
        if self.has_bitmap() {
            return Err(GribError::UnsupportedPacking(
                self.repr_definition.template_number,
            ));
        }
        Ok(MessageIndex {
            offset: self.offset as u64,
            size: self.size as u64,
            data_offset: self.data.data_offset as u64,
            scanning_mode: self.scanning_mode()?,
            packing: PackingIndex::from_repr(&self.repr_definition)?,
        })
    }
}

fn missing_section(num: u8) -> GribError {
    GribError::Malformed(format!("message is missing section {num}"))
}

/// Reads and assembles the message starting at `offset` using positioned
/// reads, without touching the packed payload.
pub fn read_message_at<R: ReadAt + ?Sized>(
    source: &R,
    offset: u64,
) -> Result<Message, GribError> {
    let first = frame_at(source, offset)?;
    if first.num != 0 {
        return Err(GribError::Malformed(format!(
            "no indicator section at offset {offset}"
        )));
    }
    let mut buf = [0; SECT0_SIZE];
    source.read_exact_at(&mut buf, offset)?;
    let indicator = Indicator::from_slice(&buf)?;
    let whole_size = indicator.total_length as usize;

    let mut sections = vec![SectionInfo {
        num: 0,
        offset: offset as usize,
        size: SECT0_SIZE,
        body: Some(SectionBody::Section0(indicator)),
    }];
    let mut rest_size = whole_size - SECT0_SIZE;
    let mut pos = offset + SECT0_SIZE as u64;

    loop {
        if rest_size == SECT8_SIZE {
            let mut magic = [0; SECT8_SIZE];
            source.read_exact_at(&mut magic, pos)?;
            if magic != SECT8_MAGIC {
                return Err(GribError::Malformed(
                    "content of the end section is not valid".to_owned(),
                ));
            }
            sections.push(SectionInfo {
                num: 8,
                offset: pos as usize,
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

        let frame = frame_at(source, pos)?;
        if !(1..=7).contains(&frame.num) {
            return Err(GribError::Malformed(format!(
                "unexpected section {} inside a message",
                frame.num
            )));
        }
        if frame.size > rest_size - SECT8_SIZE {
            return Err(GribError::Malformed(format!(
                "section {} length {} overflows the message",
                frame.num, frame.size
            )));
        }
        let body = if frame.num == 7 {
            SectionBody::Section7(DataSection {
                data_offset: frame.offset as usize + SECT_HEADER_SIZE,
                data_size: frame.size - SECT_HEADER_SIZE,
            })
        } else {
            let mut body = vec![0; frame.size - SECT_HEADER_SIZE];
            source.read_exact_at(&mut body, frame.offset + SECT_HEADER_SIZE as u64)?;
            SectionBody::from_body(frame.num, &body)?
        };
        sections.push(SectionInfo {
            num: frame.num,
            offset: frame.offset as usize,
            size: frame.size,
            body: Some(body),
        });
        pos += frame.size as u64;
        rest_size -= frame.size;
    }

    Message::from_sections(sections)
}

/// Iterator over the messages of a file, in file order.
///
/// Yields each message by offset and advances by the total length reported
/// in its indicator section. A clean end of input at a message boundary ends
/// the iteration; truncation inside a message surfaces as an error.
pub struct MessageIter<R> {
    reader: R,
    offset: usize,
    done: bool,
}

impl<R: Grib2Read> Iterator for MessageIter<R> {
    type Item = Result<Message, GribError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let sections = match self.reader.scan_message(self.offset) {
            Ok(sections) => sections,
            Err(GribError::EndOfFile) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        match Message::from_sections(sections) {
            Ok(message) => {
                self.offset += message.size();
                Some(Ok(message))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Walks a byte stream of concatenated GRIB2 messages.
pub fn iter_messages<R: Read + Seek>(reader: R) -> MessageIter<SeekableGrib2Reader<R>> {
    MessageIter {
        reader: SeekableGrib2Reader::new(reader),
        offset: 0,
        done: false,
    }
}
