mod common;
mod hl7;
mod instrument_text;

pub use common::parse_hl7_timestamp;
pub use hl7::{decode_hl7, Delimiters, Hl7Decoder};
pub use instrument_text::{decode_instrument_text, InstrumentTextDecoder};

pub(crate) use common::{component_at, field_at, split_components};
