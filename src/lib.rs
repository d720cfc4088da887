mod bitstream;
mod cache;
mod decoders;
mod error;
mod grid;
mod index;
mod message;
mod point;
mod reader;
mod sections;
mod templates;
mod utils;

pub use crate::{
    bitstream::*, cache::*, decoders::*, error::*, grid::*, index::*, message::*, point::*,
    reader::*, sections::*, templates::*, utils::ScaledValue,
};
