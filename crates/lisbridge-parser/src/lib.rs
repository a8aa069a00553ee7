pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::DecodeError;
pub use formats::{
    decode_hl7, decode_instrument_text, parse_hl7_timestamp, Delimiters, Hl7Decoder,
    InstrumentTextDecoder,
};
pub use model::{
    Address, DecodedMessage, Hl7Message, InstrumentReport, Observation, Patient,
    PatientIdentifier, PersonName, Protocol, StripParameter, TestValue,
};
pub use registry::{
    all_decoder_descriptors, decode_with, decoder_for, route, DecoderDescriptor, MessageDecoder,
};
