use once_cell::sync::Lazy;

use crate::errors::DecodeError;
use crate::formats::{Hl7Decoder, InstrumentTextDecoder};
use crate::model::{DecodedMessage, Protocol};

pub trait MessageDecoder: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, content: &str) -> Result<DecodedMessage, DecodeError>;
}

#[derive(Debug, Clone)]
pub struct DecoderDescriptor {
    pub code: &'static str,
    pub protocol: Protocol,
    pub version: &'static str,
    pub description: &'static str,
}

static DECODERS: Lazy<Vec<DecoderDescriptor>> = Lazy::new(|| {
    vec![
        DecoderDescriptor {
            code: Hl7Decoder::NAME,
            protocol: Protocol::Hl7,
            version: "0.1.0",
            description: "HL7 v2 PID/OBR/OBX decoder with MSH-declared delimiters",
        },
        DecoderDescriptor {
            code: InstrumentTextDecoder::NAME,
            protocol: Protocol::Rs232,
            version: "0.1.0",
            description: "Urine strip analyzer text dump (specimen header + one line per parameter)",
        },
    ]
});

pub fn all_decoder_descriptors() -> &'static [DecoderDescriptor] {
    DECODERS.as_slice()
}

/// Picks the decoder for a protocol and device type. Unknown protocols have none.
pub fn decoder_for(protocol: &str, _device_type_code: &str) -> Option<&'static dyn MessageDecoder> {
    match Protocol::from_code(protocol)? {
        Protocol::Hl7 => Some(&Hl7Decoder),
        // Every RS232 device type currently prints the same strip layout.
        Protocol::Rs232 => Some(&InstrumentTextDecoder),
    }
}

/// Decodes `raw` with the decoder registered for `(protocol, device_type_code)`.
///
/// `Ok(None)` means no decoder is registered: callers treat that as a deliberate skip.
/// A decoder failure is returned as `Err`.
pub fn route(
    protocol: &str,
    device_type_code: &str,
    raw: &str,
) -> Result<Option<DecodedMessage>, DecodeError> {
    match decoder_for(protocol, device_type_code) {
        Some(decoder) => decoder.decode(raw).map(Some),
        None => Ok(None),
    }
}

/// Like [`route`], but an unknown protocol is an error.
pub fn decode_with(
    protocol: &str,
    device_type_code: &str,
    raw: &str,
) -> Result<DecodedMessage, DecodeError> {
    route(protocol, device_type_code, raw)?.ok_or_else(|| DecodeError::Unsupported {
        protocol: protocol.to_string(),
    })
}
