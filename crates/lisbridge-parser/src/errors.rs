use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{decoder} message malformed: {reason}")]
    MalformedMessage {
        decoder: &'static str,
        reason: String,
    },

    #[error("no decoder registered for protocol '{protocol}'")]
    Unsupported { protocol: String },
}

impl DecodeError {
    pub fn malformed(decoder: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            decoder,
            reason: reason.into(),
        }
    }
}
