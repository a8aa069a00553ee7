use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inbound instrument message, already base64-decoded and validated upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeviceMessage {
    pub device_id: String,
    pub device_type_code: String,
    pub protocol: String,
    pub message: String,
}

impl RawDeviceMessage {
    pub fn new(
        device_id: impl Into<String>,
        device_type_code: impl Into<String>,
        protocol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_type_code: device_type_code.into(),
            protocol: protocol.into(),
            message: message.into(),
        }
    }
}

/// A stored [`RawDeviceMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub id: Uuid,
    pub device_id: String,
    pub device_type_code: String,
    pub protocol: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceMessage {
    pub fn from_raw(raw: &RawDeviceMessage) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            device_id: raw.device_id.clone(),
            device_type_code: raw.device_type_code.clone(),
            protocol: raw.protocol.clone(),
            message: raw.message.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Protocol-neutral record handed to the result platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serializer {
    pub device_id: String,
    pub protocol: String,
    pub device_type_code: String,
    pub sequence_number: i64,
    pub patient_id: String,
    pub timestamp: Option<String>,
    pub results: Vec<CanonicalResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResult {
    pub parameter_code: String,
    pub parameter_name: String,
    pub value: String,
    pub numeric_value: f64,
    pub unit: String,
    pub qualitative: String,
    pub reference_range: String,
    pub abnormal_flags: String,
}
