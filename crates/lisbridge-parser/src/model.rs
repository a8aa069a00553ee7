use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Wire protocols an instrument can report over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Hl7,
    Rs232,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Hl7 => "hl7",
            Protocol::Rs232 => "rs232",
        }
    }

    /// Protocol codes are matched exactly as the instruments send them.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "hl7" => Some(Protocol::Hl7),
            "rs232" => Some(Protocol::Rs232),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hl7Message {
    pub patient: Patient,
    pub tests: Vec<Observation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_order_datetime: Option<String>,
}

impl Hl7Message {
    /// First identifier from PID-3, the one downstream systems key patients on.
    pub fn primary_identifier(&self) -> Option<&str> {
        self.patient
            .identifiers
            .first()
            .map(|identifier| identifier.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Patient {
    pub identifiers: Vec<PatientIdentifier>,
    pub name: PersonName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientIdentifier {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub identifier_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonName {
    #[serde(rename = "family_name", skip_serializing_if = "String::is_empty")]
    pub family: String,
    #[serde(rename = "given_name", skip_serializing_if = "String::is_empty")]
    pub given: String,
    #[serde(rename = "middle_name", skip_serializing_if = "String::is_empty")]
    pub middle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suffix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub street: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub other: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country: String,
}

/// One OBX segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub coding_system: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub units: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reference_range: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub abnormal_flags: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub observation_datetime: String,
}

/// Urine strip parameters carried in a generic [`TestValue`] slot, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripParameter {
    Leukocytes,
    Ketones,
    Nitrites,
    Urobilinogen,
    Bilirubin,
    Protein,
    Glucose,
    Blood,
    AscorbicAcid,
}

impl StripParameter {
    pub const ALL: [StripParameter; 9] = [
        StripParameter::Leukocytes,
        StripParameter::Ketones,
        StripParameter::Nitrites,
        StripParameter::Urobilinogen,
        StripParameter::Bilirubin,
        StripParameter::Protein,
        StripParameter::Glucose,
        StripParameter::Blood,
        StripParameter::AscorbicAcid,
    ];

    /// Maps the analyzer's upper-cased line prefix onto a slot.
    pub fn from_instrument_code(code: &str) -> Option<Self> {
        match code {
            "LEU" => Some(StripParameter::Leukocytes),
            "KET" => Some(StripParameter::Ketones),
            "NIT" => Some(StripParameter::Nitrites),
            "URO" => Some(StripParameter::Urobilinogen),
            "BIL" => Some(StripParameter::Bilirubin),
            "PRO" => Some(StripParameter::Protein),
            "GLU" => Some(StripParameter::Glucose),
            "BLD" => Some(StripParameter::Blood),
            "VC" => Some(StripParameter::AscorbicAcid),
            _ => None,
        }
    }

    pub fn canonical_code(&self) -> &'static str {
        match self {
            StripParameter::Leukocytes => "leukocytes",
            StripParameter::Ketones => "ketones",
            StripParameter::Nitrites => "nitrites",
            StripParameter::Urobilinogen => "urobilinogen",
            StripParameter::Bilirubin => "bilirubin",
            StripParameter::Protein => "protein",
            StripParameter::Glucose => "glucose",
            StripParameter::Blood => "blood",
            StripParameter::AscorbicAcid => "ascorbic_acid",
        }
    }
}

impl fmt::Display for StripParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_code())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestValue {
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit: String,
    pub numeric: f64,
    pub is_numeric: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub qualitative: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentReport {
    pub raw_message: String,
    pub specimen_id: String,
    pub date_time: Option<NaiveDateTime>,
    pub leukocytes: TestValue,
    pub ketones: TestValue,
    pub nitrites: TestValue,
    pub urobilinogen: TestValue,
    pub bilirubin: TestValue,
    pub protein: TestValue,
    pub glucose: TestValue,
    pub blood: TestValue,
    pub ascorbic_acid: TestValue,
    pub specific_gravity: f64,
    pub ph: f64,
}

impl InstrumentReport {
    pub fn slot(&self, parameter: StripParameter) -> &TestValue {
        match parameter {
            StripParameter::Leukocytes => &self.leukocytes,
            StripParameter::Ketones => &self.ketones,
            StripParameter::Nitrites => &self.nitrites,
            StripParameter::Urobilinogen => &self.urobilinogen,
            StripParameter::Bilirubin => &self.bilirubin,
            StripParameter::Protein => &self.protein,
            StripParameter::Glucose => &self.glucose,
            StripParameter::Blood => &self.blood,
            StripParameter::AscorbicAcid => &self.ascorbic_acid,
        }
    }

    pub fn slot_mut(&mut self, parameter: StripParameter) -> &mut TestValue {
        match parameter {
            StripParameter::Leukocytes => &mut self.leukocytes,
            StripParameter::Ketones => &mut self.ketones,
            StripParameter::Nitrites => &mut self.nitrites,
            StripParameter::Urobilinogen => &mut self.urobilinogen,
            StripParameter::Bilirubin => &mut self.bilirubin,
            StripParameter::Protein => &mut self.protein,
            StripParameter::Glucose => &mut self.glucose,
            StripParameter::Blood => &mut self.blood,
            StripParameter::AscorbicAcid => &mut self.ascorbic_acid,
        }
    }
}

/// Output of whichever decoder the router selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum DecodedMessage {
    Hl7(Hl7Message),
    InstrumentText(InstrumentReport),
}

impl DecodedMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedMessage::Hl7(_) => "hl7",
            DecodedMessage::InstrumentText(_) => "instrument_text",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
