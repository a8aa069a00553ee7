pub mod canonical;
pub mod config;
#[cfg(feature = "runtime")]
pub mod db;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod publisher;
pub mod repository;

pub use canonical::{sequence_number, serialize};
pub use config::{AppConfig, Environment, PlatformConfig};
pub use error::{ConfigError, PipelineError, PublishError, RepositoryError};
pub use model::{CanonicalResult, DeviceMessage, RawDeviceMessage, Serializer};
pub use pipeline::{DeviceMessagePipeline, ProcessOutcome, ProcessReceipt, SkipReason};
#[cfg(feature = "runtime")]
pub use publisher::HttpPublisher;
pub use publisher::{is_retryable_status, RecordingPublisher, ResultPublisher, RetryPolicy};
#[cfg(feature = "runtime")]
pub use repository::PostgresDeviceMessageRepository;
pub use repository::{DeviceMessageRepository, InMemoryDeviceMessageRepository};
