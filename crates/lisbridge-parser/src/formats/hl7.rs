use crate::errors::DecodeError;
use crate::model::{
    Address, DecodedMessage, Hl7Message, Observation, Patient, PatientIdentifier, PersonName,
};
use crate::registry::MessageDecoder;

use super::{component_at, field_at, parse_hl7_timestamp, split_components};

const DEFAULT_COMPONENT: char = '^';
const DEFAULT_REPETITION: char = '~';
const DEFAULT_ESCAPE: char = '\\';
const DEFAULT_SUBCOMPONENT: char = '&';

/// Separators declared by an `MSH` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: DEFAULT_COMPONENT,
            repetition: DEFAULT_REPETITION,
            escape: DEFAULT_ESCAPE,
            subcomponent: DEFAULT_SUBCOMPONENT,
        }
    }
}

impl Delimiters {
    /// Reads the field separator (the character right after `MSH`) and the encoding
    /// characters (MSH-2). Characters missing from a short MSH-2 keep their defaults.
    pub fn from_msh(segment: &str) -> Result<Self, DecodeError> {
        if !segment.starts_with("MSH") {
            return Err(DecodeError::malformed(
                Hl7Decoder::NAME,
                "message does not start with MSH",
            ));
        }
        let field = segment[3..].chars().next().ok_or_else(|| {
            DecodeError::malformed(Hl7Decoder::NAME, "MSH segment has no field separator")
        })?;

        let encoding = segment
            .split(field)
            .nth(1)
            .filter(|chars| !chars.is_empty())
            .unwrap_or("^~\\&");
        let mut chars = encoding.chars();

        Ok(Self {
            field,
            component: chars.next().unwrap_or(DEFAULT_COMPONENT),
            repetition: chars.next().unwrap_or(DEFAULT_REPETITION),
            escape: chars.next().unwrap_or(DEFAULT_ESCAPE),
            subcomponent: chars.next().unwrap_or(DEFAULT_SUBCOMPONENT),
        })
    }

    fn components<'a>(&self, field: &'a str) -> Vec<&'a str> {
        split_components(field, self.component)
    }
}

pub struct Hl7Decoder;

impl Default for Hl7Decoder {
    fn default() -> Self {
        Self
    }
}

impl Hl7Decoder {
    pub const NAME: &'static str = "HL7_V2";
}

impl MessageDecoder for Hl7Decoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn decode(&self, content: &str) -> Result<DecodedMessage, DecodeError> {
        decode_hl7(content).map(DecodedMessage::Hl7)
    }
}

/// Decodes one HL7 v2 message, extracting the patient (PID), the order datetime (OBR) and
/// every observation (OBX). Other segments are ignored.
pub fn decode_hl7(message: &str) -> Result<Hl7Message, DecodeError> {
    let segments: Vec<&str> = message
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let header = segments.first().ok_or_else(|| {
        DecodeError::malformed(Hl7Decoder::NAME, "message does not start with MSH")
    })?;
    let delimiters = Delimiters::from_msh(header)?;

    let mut decoded = Hl7Message::default();

    for segment in &segments {
        let Some(tag) = segment.get(..3) else {
            continue;
        };
        let fields: Vec<&str> = segment.split(delimiters.field).collect();

        match tag {
            "PID" => decoded.patient = parse_pid(&fields, &delimiters),
            "OBR" => {
                if decoded.primary_order_datetime.is_none() {
                    decoded.primary_order_datetime = parse_obr_datetime(&fields);
                }
            }
            "OBX" => decoded.tests.push(parse_obx(&fields, &delimiters)),
            _ => {}
        }
    }

    Ok(decoded)
}

fn parse_pid(fields: &[&str], delimiters: &Delimiters) -> Patient {
    let identifiers = field_at(fields, 3);
    let identifiers = if identifiers.is_empty() {
        Vec::new()
    } else {
        identifiers
            .split(delimiters.repetition)
            .filter_map(|repetition| {
                let components = delimiters.components(repetition);
                let id = component_at(&components, 0);
                if id.is_empty() {
                    return None;
                }
                Some(PatientIdentifier {
                    id,
                    identifier_type: component_at(&components, 4),
                })
            })
            .collect()
    };

    let name = delimiters.components(field_at(fields, 5));
    let address = delimiters.components(field_at(fields, 11));
    let sex = field_at(fields, 8);

    Patient {
        identifiers,
        name: PersonName {
            family: component_at(&name, 0),
            given: component_at(&name, 1),
            middle: component_at(&name, 2),
            suffix: component_at(&name, 3),
        },
        dob: parse_hl7_timestamp(field_at(fields, 7)),
        sex: (!sex.is_empty()).then(|| sex.to_string()),
        address: Address {
            street: component_at(&address, 0),
            other: component_at(&address, 1),
            city: component_at(&address, 2),
            state: component_at(&address, 3),
            zip: component_at(&address, 4),
            country: component_at(&address, 5),
        },
    }
}

/// OBR-7 (observation datetime), falling back to OBR-14 (specimen received).
fn parse_obr_datetime(fields: &[&str]) -> Option<String> {
    parse_hl7_timestamp(field_at(fields, 7)).or_else(|| parse_hl7_timestamp(field_at(fields, 14)))
}

fn parse_obx(fields: &[&str], delimiters: &Delimiters) -> Observation {
    let identifier = delimiters.components(field_at(fields, 3));

    let units_raw = field_at(fields, 6);
    let units = match delimiters.components(units_raw).first() {
        Some(first) if !first.is_empty() => first.to_string(),
        _ => units_raw.to_string(),
    };

    Observation {
        code: component_at(&identifier, 0),
        name: component_at(&identifier, 1),
        coding_system: component_at(&identifier, 2),
        value: field_at(fields, 5).to_string(),
        units,
        reference_range: field_at(fields, 7).to_string(),
        abnormal_flags: field_at(fields, 8).to_string(),
        observation_datetime: parse_hl7_timestamp(field_at(fields, 14)).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiters_follow_msh_header() {
        let delimiters = Delimiters::from_msh("MSH#*@\\%#LAB").expect("valid header");
        assert_eq!(delimiters.field, '#');
        assert_eq!(delimiters.component, '*');
        assert_eq!(delimiters.repetition, '@');
        assert_eq!(delimiters.escape, '\\');
        assert_eq!(delimiters.subcomponent, '%');
    }

    #[test]
    fn short_encoding_characters_fall_back_to_defaults() {
        let delimiters = Delimiters::from_msh("MSH|$|SENDER").expect("valid header");
        assert_eq!(delimiters.component, '$');
        assert_eq!(delimiters.repetition, '~');
        assert_eq!(delimiters.subcomponent, '&');

        let delimiters = Delimiters::from_msh("MSH||SENDER").expect("valid header");
        assert_eq!(delimiters, Delimiters::default());
    }

    #[test]
    fn header_without_separator_is_malformed() {
        let err = Delimiters::from_msh("MSH").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMessage { .. }));
    }

    #[test]
    fn units_fall_back_to_raw_field() {
        let delimiters = Delimiters::default();
        let fields = vec!["OBX", "1", "NM", "GLU^Glucose^LN", "", "5.4", "^mmol/L"];
        let observation = parse_obx(&fields, &delimiters);
        assert_eq!(observation.units, "^mmol/L");

        let fields = vec!["OBX", "1", "NM", "GLU^Glucose^LN", "", "5.4", "mmol/L^^UCUM"];
        let observation = parse_obx(&fields, &delimiters);
        assert_eq!(observation.units, "mmol/L");
    }
}
