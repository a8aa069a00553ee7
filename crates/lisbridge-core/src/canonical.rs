//! Flattens decoder output into the protocol-neutral [`Serializer`] record.

use std::num::IntErrorKind;

use chrono::SecondsFormat;
use lisbridge_parser::{DecodedMessage, Hl7Message, InstrumentReport, StripParameter};

use crate::model::{CanonicalResult, RawDeviceMessage, Serializer};

pub const SPECIFIC_GRAVITY_CODE: &str = "specific_gravity";
pub const PH_CODE: &str = "ph";

/// Builds the canonical record for a decoded message. Never fails.
pub fn serialize(decoded: &DecodedMessage, raw: &RawDeviceMessage) -> Serializer {
    match decoded {
        DecodedMessage::Hl7(message) => serialize_hl7(message, raw),
        DecodedMessage::InstrumentText(report) => serialize_instrument(report, raw),
    }
}

/// Concatenates every ASCII digit in `identifier` and parses the result.
///
/// `"PT-00123-A"` gives `123`. No digits gives `0`; a run too long for `i64` saturates at
/// `i64::MAX`.
pub fn sequence_number(identifier: &str) -> i64 {
    let digits: String = identifier.chars().filter(char::is_ascii_digit).collect();
    match digits.parse::<i64>() {
        Ok(value) => value,
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => i64::MAX,
        Err(_) => 0,
    }
}

fn serialize_hl7(message: &Hl7Message, raw: &RawDeviceMessage) -> Serializer {
    let patient_id = message.primary_identifier().unwrap_or_default().to_string();

    let results = message
        .tests
        .iter()
        .map(|test| CanonicalResult {
            parameter_code: test.code.clone(),
            parameter_name: test.name.clone(),
            value: test.value.clone(),
            unit: test.units.clone(),
            reference_range: test.reference_range.clone(),
            abnormal_flags: test.abnormal_flags.clone(),
            ..CanonicalResult::default()
        })
        .collect();

    Serializer {
        device_id: raw.device_id.clone(),
        protocol: raw.protocol.clone(),
        device_type_code: raw.device_type_code.clone(),
        sequence_number: sequence_number(&patient_id),
        patient_id,
        timestamp: message.primary_order_datetime.clone(),
        results,
    }
}

fn serialize_instrument(report: &InstrumentReport, raw: &RawDeviceMessage) -> Serializer {
    let mut results: Vec<CanonicalResult> = StripParameter::ALL
        .iter()
        .map(|&parameter| {
            let slot = report.slot(parameter);
            CanonicalResult {
                parameter_code: parameter.canonical_code().to_string(),
                value: slot.value.clone(),
                numeric_value: slot.numeric,
                unit: slot.unit.clone(),
                qualitative: slot.qualitative.clone(),
                ..CanonicalResult::default()
            }
        })
        .collect();

    results.push(bare_numeric(SPECIFIC_GRAVITY_CODE, report.specific_gravity));
    results.push(bare_numeric(PH_CODE, report.ph));

    Serializer {
        device_id: raw.device_id.clone(),
        protocol: raw.protocol.clone(),
        device_type_code: raw.device_type_code.clone(),
        sequence_number: sequence_number(&report.specimen_id),
        patient_id: report.specimen_id.clone(),
        timestamp: report
            .date_time
            .map(|dt| dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true)),
        results,
    }
}

fn bare_numeric(code: &str, value: f64) -> CanonicalResult {
    CanonicalResult {
        parameter_code: code.to_string(),
        numeric_value: value,
        ..CanonicalResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_concatenates_digits() {
        assert_eq!(sequence_number("PT-00123-A"), 123);
        assert_eq!(sequence_number("NO.12-34"), 1234);
        assert_eq!(sequence_number("ABC"), 0);
        assert_eq!(sequence_number(""), 0);
    }

    #[test]
    fn sequence_number_overflow_saturates() {
        assert_eq!(sequence_number("99999999999999999999999"), i64::MAX);
        assert_eq!(sequence_number("SPEC-2024011512345678901234"), i64::MAX);
        assert_eq!(sequence_number("9223372036854775807"), i64::MAX);
        assert_eq!(sequence_number("9223372036854775806"), i64::MAX - 1);
    }

    #[test]
    fn non_ascii_digits_are_ignored() {
        assert_eq!(sequence_number("٣4"), 4);
    }
}
