use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::errors::DecodeError;
use crate::model::{DecodedMessage, InstrumentReport, StripParameter, TestValue};
use crate::registry::MessageDecoder;

/// Decoder for the line-oriented text dump urine strip analyzers print over RS232.
pub struct InstrumentTextDecoder;

impl Default for InstrumentTextDecoder {
    fn default() -> Self {
        Self
    }
}

impl InstrumentTextDecoder {
    pub const NAME: &'static str = "RS232_URINE_STRIP";
}

impl MessageDecoder for InstrumentTextDecoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn decode(&self, content: &str) -> Result<DecodedMessage, DecodeError> {
        Ok(DecodedMessage::InstrumentText(decode_instrument_text(content)))
    }
}

/// Which capture groups a grammar provides beyond parameter (1) and value (2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupLayout {
    ValueOnly,
    WithNumericAndUnit,
}

struct LineGrammar {
    name: &'static str,
    pattern: Regex,
    layout: GroupLayout,
}

impl LineGrammar {
    fn new(name: &'static str, pattern: &str, layout: GroupLayout) -> Self {
        let pattern = Regex::new(pattern)
            .unwrap_or_else(|err| panic!("invalid line grammar {name}: {err}"));
        Self {
            name,
            pattern,
            layout,
        }
    }

    fn extract<'t>(&self, line: &'t str) -> Option<LineMatch<'t>> {
        let captures = self.pattern.captures(line)?;
        let group = |captures: &Captures<'t>, index: usize| {
            captures
                .get(index)
                .map(|m| m.as_str())
                .filter(|text| !text.is_empty())
        };

        let parameter = captures.get(1)?.as_str();
        let value = captures.get(2)?.as_str();
        let (numeric, unit) = match self.layout {
            GroupLayout::ValueOnly => (None, None),
            GroupLayout::WithNumericAndUnit => (group(&captures, 3), group(&captures, 4)),
        };

        Some(LineMatch {
            grammar: self.name,
            parameter,
            value,
            numeric,
            unit,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LineMatch<'t> {
    grammar: &'static str,
    parameter: &'t str,
    value: &'t str,
    numeric: Option<&'t str>,
    unit: Option<&'t str>,
}

// Evaluated top to bottom, first match wins. The grammars overlap, so order is precedence.
// `(?-u)` keeps `\w`, `\s` and `\d` to ASCII as the analyzers emit.
static LINE_GRAMMARS: Lazy<Vec<LineGrammar>> = Lazy::new(|| {
    vec![
        // "SG         1.015"
        LineGrammar::new(
            "parameter_value",
            r"(?-u)^(\w{2,4})\s+([\d.*]+)",
            GroupLayout::ValueOnly,
        ),
        // "*LEU +3    500 CELL/uL"
        LineGrammar::new(
            "flagged_measurement",
            r"(?-u)^\*?(\w{2,4})\s+([+\-]?\w+)\s+([\d.]+)\s+(\w+/?\w*)",
            GroupLayout::WithNumericAndUnit,
        ),
        // "KET +1     1.5 mmol/L"
        LineGrammar::new(
            "measurement",
            r"(?-u)^(\w{2,4})\s+([+\-]?\w+)\s+([\d.]+)\s+(\w+/?\w*)",
            GroupLayout::WithNumericAndUnit,
        ),
        // "NIT -"
        LineGrammar::new(
            "flag_only",
            r"(?-u)^(\w{2,4})\s+([+\-]?\w+)",
            GroupLayout::ValueOnly,
        ),
        // "URO            Normal"
        LineGrammar::new(
            "qualitative",
            r"(?-u)^(\w{2,4})\s+([\w\s]+)$",
            GroupLayout::ValueOnly,
        ),
    ]
});

/// Decodes an analyzer dump. Never fails: lines that match no grammar, or name a
/// parameter outside the strip table, are skipped.
pub fn decode_instrument_text(text: &str) -> InstrumentReport {
    let mut report = InstrumentReport::default();

    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if report.specimen_id.is_empty() && line.starts_with("NO.") {
            apply_header(line, &mut report);
            continue;
        }

        // Date and time arrive on separate lines; the time line completes a seeded date.
        if let Some(seeded) = report.date_time {
            if line.contains(':') {
                if let Ok(time) = NaiveTime::parse_from_str(line, "%H:%M:%S") {
                    report.date_time = Some(seeded.date().and_time(time));
                }
                continue;
            }
        }

        apply_test_line(line, &mut report);
    }

    report.raw_message = text.to_string();
    report
}

fn apply_header(line: &str, report: &mut InstrumentReport) {
    let mut tokens = line.split_whitespace();
    if let Some(specimen_id) = tokens.next() {
        report.specimen_id = specimen_id.to_string();
    }
    if let Some(date) = tokens.next() {
        if let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            report.date_time = Some(date.and_time(NaiveTime::MIN));
        }
    }
}

fn apply_test_line(line: &str, report: &mut InstrumentReport) {
    let Some(matched) = LINE_GRAMMARS.iter().find_map(|grammar| grammar.extract(line)) else {
        return;
    };

    let parameter = matched.parameter.trim().to_ascii_uppercase();
    let value = matched.value.trim();

    match parameter.as_str() {
        "SG" => {
            if let Ok(parsed) = value.parse::<f64>() {
                report.specific_gravity = parsed;
            }
        }
        "PH" => {
            if let Ok(parsed) = value.parse::<f64>() {
                report.ph = parsed;
            }
        }
        code => {
            let Some(slot) = StripParameter::from_instrument_code(code) else {
                return;
            };
            let numeric = matched.numeric.and_then(|raw| raw.parse::<f64>().ok());
            *report.slot_mut(slot) = TestValue {
                value: value.to_string(),
                unit: matched.unit.map(str::trim).unwrap_or_default().to_string(),
                numeric: numeric.unwrap_or_default(),
                is_numeric: numeric.is_some(),
                qualitative: value.to_string(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(line: &str) -> Option<LineMatch<'_>> {
        LINE_GRAMMARS.iter().find_map(|grammar| grammar.extract(line))
    }

    #[test]
    fn grammars_compile() {
        assert_eq!(LINE_GRAMMARS.len(), 5);
    }

    #[test]
    fn bare_numeric_line_uses_first_grammar() {
        let matched = first_match("SG         1.015").expect("match");
        assert_eq!(matched.grammar, "parameter_value");
        assert_eq!(matched.parameter, "SG");
        assert_eq!(matched.value, "1.015");
        assert_eq!(matched.numeric, None);
    }

    #[test]
    fn asterisk_line_uses_flagged_grammar() {
        let matched = first_match("*LEU +3    500 CELL/uL").expect("match");
        assert_eq!(matched.grammar, "flagged_measurement");
        assert_eq!(matched.parameter, "LEU");
        assert_eq!(matched.value, "+3");
        assert_eq!(matched.numeric, Some("500"));
        assert_eq!(matched.unit, Some("CELL/uL"));
    }

    #[test]
    fn flag_without_value_uses_flag_only_grammar() {
        let matched = first_match("NIT neg").expect("match");
        assert_eq!(matched.grammar, "flag_only");
        assert_eq!(matched.value, "neg");
    }

    #[test]
    fn dangling_sign_matches_nothing() {
        assert_eq!(first_match("KET -        0 mmol/L"), None);
        assert_eq!(first_match("X 12"), None);
    }

    #[test]
    fn unknown_parameter_is_dropped() {
        let mut report = InstrumentReport::default();
        apply_test_line("ABC +1 10 mg/dL", &mut report);
        assert_eq!(report, InstrumentReport::default());
    }
}
