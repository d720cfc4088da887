use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
};

/// The template registry a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Grid,
    Product,
    DataRepr,
}

impl Display for TemplateKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Grid => write!(f, "grid definition"),
            Self::Product => write!(f, "product definition"),
            Self::DataRepr => write!(f, "data representation"),
        }
    }
}

/// Errors surfaced by this crate.
///
/// The decoder recovers from nothing internally; every failure propagates to
/// the caller unchanged. [`GribError::EndOfFile`] marks a clean end of input
/// at a message boundary and is distinct from [`GribError::EndOfStream`],
/// which marks truncation inside a message or bit stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GribError {
    /// Wrong magic, a length field that overflows its container, or an end
    /// section with the wrong content.
    Malformed(String),
    /// Edition number in Section 0 is not 2.
    UnsupportedEdition(u8),
    /// Unknown GDT/PDT/DRT number.
    UnsupportedTemplate(TemplateKind, u16),
    /// Scanning-mode flags outside the supported set.
    UnsupportedScanMode(u8),
    /// Point access requested against a message whose data representation
    /// does not allow it.
    UnsupportedPacking(u16),
    /// Bit-stream or grid index out of bounds.
    OutOfRange { index: usize, len: usize },
    /// Bit read wider than 64 bits.
    WidthTooLarge(usize),
    /// Input ended in the middle of a message or bit stream.
    EndOfStream,
    /// Input ended cleanly at a message boundary.
    EndOfFile,
    /// Underlying byte-source failure.
    Io(String),
}

impl Error for GribError {}

impl Display for GribError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Malformed(s) => write!(f, "malformed GRIB2 data: {s}"),
            Self::UnsupportedEdition(v) => write!(f, "not GRIB edition 2: {v}"),
            Self::UnsupportedTemplate(kind, num) => {
                write!(f, "unsupported {kind} template: {num}")
            }
            Self::UnsupportedScanMode(mode) => {
                write!(f, "unsupported scanning mode: 0b{mode:08b}")
            }
            Self::UnsupportedPacking(num) => {
                write!(
                    f,
                    "data representation template {num} does not support point access"
                )
            }
            Self::OutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::WidthTooLarge(width) => write!(f, "bit width too large: {width}"),
            Self::EndOfStream => write!(f, "unexpected end of stream"),
            Self::EndOfFile => write!(f, "end of file"),
            Self::Io(s) => write!(f, "read error: {s}"),
        }
    }
}

impl From<io::Error> for GribError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::EndOfStream
        } else {
            Self::Io(e.to_string())
        }
    }
}
