//! Tag-dispatched decoders for the variable trailing payloads of sections
//! 3, 4 and 5. Each registry is a closed mapping from the template number
//! carried in the parent section to a fixed-layout record; unknown numbers
//! surface [`UnsupportedTemplate`](crate::GribError::UnsupportedTemplate)
//! and number 255 decodes to an explicit missing placeholder.

mod grid;
mod product;
mod repr;

pub use self::{grid::*, product::*, repr::*};
