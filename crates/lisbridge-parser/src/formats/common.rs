use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};

/// Returns the field at `index`, or `""` when the segment is shorter.
pub(crate) fn field_at<'a>(fields: &[&'a str], index: usize) -> &'a str {
    fields.get(index).copied().unwrap_or("")
}

/// Splits a field into components. An empty field has no components at all.
pub(crate) fn split_components(field: &str, separator: char) -> Vec<&str> {
    if field.is_empty() {
        return Vec::new();
    }
    field.split(separator).collect()
}

pub(crate) fn component_at(components: &[&str], index: usize) -> String {
    components.get(index).copied().unwrap_or("").to_string()
}

/// Converts an HL7 `TS` value into ISO 8601.
///
/// Accepts `YYYYMMDD`, `YYYYMMDDHH`, `YYYYMMDDHHMM` and `YYYYMMDDHHMMSS`, each optionally
/// followed by fractional seconds (dropped) and a `+HHMM`/`-HHMM` offset. Date-only values
/// render as `YYYY-MM-DD`; everything else renders as RFC 3339, in UTC when no offset was
/// given. Anything else yields `None`.
pub fn parse_hl7_timestamp(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let (main, offset) = match raw.find(['+', '-']) {
        Some(pos) if pos > 0 => (&raw[..pos], Some(&raw[pos..])),
        _ => (raw, None),
    };
    let main = main.split('.').next().unwrap_or(main);

    if !matches!(main.len(), 8 | 10 | 12 | 14) || !main.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(
        digits(main, 0..4)? as i32,
        digits(main, 4..6)?,
        digits(main, 6..8)?,
    )?;
    let time = NaiveTime::from_hms_opt(
        optional_digits(main, 8..10)?,
        optional_digits(main, 10..12)?,
        optional_digits(main, 12..14)?,
    )?;
    let naive = NaiveDateTime::new(date, time);
    let date_only = main.len() == 8;

    match offset {
        Some(offset) => {
            let offset = parse_offset(offset)?;
            let localized = naive.and_local_timezone(offset).single()?;
            if date_only {
                Some(localized.format("%Y-%m-%d").to_string())
            } else {
                Some(localized.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
        None if date_only => Some(date.format("%Y-%m-%d").to_string()),
        None => Some(
            Utc.from_utc_datetime(&naive)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    }
}

fn digits(value: &str, range: std::ops::Range<usize>) -> Option<u32> {
    value.get(range)?.parse().ok()
}

fn optional_digits(value: &str, range: std::ops::Range<usize>) -> Option<u32> {
    if value.len() < range.end {
        return Some(0);
    }
    digits(value, range)
}

/// Parses `+HHMM` / `-HHMM`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    if rest.len() != 4 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = rest[..2].parse().ok()?;
    let minutes: i32 = rest[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
