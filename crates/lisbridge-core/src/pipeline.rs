use std::sync::Arc;

use lisbridge_parser::route;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::canonical;
use crate::error::PipelineError;
use crate::model::{RawDeviceMessage, Serializer};
use crate::publisher::ResultPublisher;
use crate::repository::DeviceMessageRepository;

/// Why a stored message produced no canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    UnsupportedProtocol { protocol: String },
    DecodeFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Published(Serializer),
    Skipped(SkipReason),
    PublishFailed { record: Serializer, error: String },
}

impl ProcessOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ProcessOutcome::Published(_) => "published",
            ProcessOutcome::Skipped(_) => "skipped",
            ProcessOutcome::PublishFailed { .. } => "publish_failed",
        }
    }

    pub fn record(&self) -> Option<&Serializer> {
        match self {
            ProcessOutcome::Published(record) | ProcessOutcome::PublishFailed { record, .. } => {
                Some(record)
            }
            ProcessOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessReceipt {
    pub message_id: Uuid,
    pub outcome: ProcessOutcome,
}

/// Persist, route, serialize and publish one inbound message.
///
/// Only a storage failure is returned as `Err`. Unsupported protocols and decode failures
/// end as [`ProcessOutcome::Skipped`]; a failed publish is logged and reported as
/// [`ProcessOutcome::PublishFailed`].
#[derive(Clone)]
pub struct DeviceMessagePipeline {
    repository: Arc<dyn DeviceMessageRepository>,
    publisher: Arc<dyn ResultPublisher>,
}

impl DeviceMessagePipeline {
    pub fn new(
        repository: Arc<dyn DeviceMessageRepository>,
        publisher: Arc<dyn ResultPublisher>,
    ) -> Self {
        Self {
            repository,
            publisher,
        }
    }

    pub fn repository(&self) -> &Arc<dyn DeviceMessageRepository> {
        &self.repository
    }

    pub async fn process(&self, raw: RawDeviceMessage) -> Result<ProcessReceipt, PipelineError> {
        let stored = self.repository.create(&raw).await?;
        info!(
            message_id = %stored.id,
            device_id = %raw.device_id,
            protocol = %raw.protocol,
            device_type_code = %raw.device_type_code,
            "device message stored"
        );

        let outcome = self.decode_and_publish(&raw).await;
        Ok(ProcessReceipt {
            message_id: stored.id,
            outcome,
        })
    }

    async fn decode_and_publish(&self, raw: &RawDeviceMessage) -> ProcessOutcome {
        let decoded = match route(&raw.protocol, &raw.device_type_code, &raw.message) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => {
                info!(
                    device_id = %raw.device_id,
                    protocol = %raw.protocol,
                    "no decoder for protocol, skipping"
                );
                return ProcessOutcome::Skipped(SkipReason::UnsupportedProtocol {
                    protocol: raw.protocol.clone(),
                });
            }
            Err(err) => {
                warn!(
                    device_id = %raw.device_id,
                    protocol = %raw.protocol,
                    error = %err,
                    "decode failed, skipping"
                );
                return ProcessOutcome::Skipped(SkipReason::DecodeFailed {
                    error: err.to_string(),
                });
            }
        };

        let record = canonical::serialize(&decoded, raw);
        debug!(
            device_id = %raw.device_id,
            decoder = decoded.kind(),
            results = record.results.len(),
            "canonical record built"
        );

        match self.publisher.post(&record).await {
            Ok(()) => {
                info!(
                    device_id = %raw.device_id,
                    sequence_number = record.sequence_number,
                    "canonical record published"
                );
                ProcessOutcome::Published(record)
            }
            Err(err) => {
                error!(
                    device_id = %raw.device_id,
                    sequence_number = record.sequence_number,
                    error = %err,
                    "publish failed"
                );
                ProcessOutcome::PublishFailed {
                    record,
                    error: err.to_string(),
                }
            }
        }
    }
}
