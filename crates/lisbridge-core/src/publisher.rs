//! Delivery of canonical records to the result platform.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::PlatformConfig;
use crate::error::PublishError;
use crate::model::Serializer;

/// One logical delivery per call; implementations own any retrying.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    async fn post(&self, record: &Serializer) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retry_count: u32,
    pub wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PlatformConfig::default())
    }
}

impl From<&PlatformConfig> for RetryPolicy {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            wait: config.retry_wait,
            max_wait: config.retry_max_wait,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (zero based): doubles from `wait`, capped at `max_wait`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.wait
            .checked_mul(factor)
            .unwrap_or(self.max_wait)
            .min(self.max_wait)
    }
}

/// 429 and every 5xx are worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Collects records instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    records: Mutex<Vec<Serializer>>,
    failure: Option<String>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that rejects every record with [`PublishError::Unavailable`].
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    pub fn records(&self) -> Vec<Serializer> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResultPublisher for RecordingPublisher {
    async fn post(&self, record: &Serializer) -> Result<(), PublishError> {
        if let Some(reason) = &self.failure {
            return Err(PublishError::Unavailable(reason.clone()));
        }
        self.records
            .lock()
            .map_err(|_| PublishError::Unavailable("recording publisher poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

#[cfg(feature = "runtime")]
pub use http::HttpPublisher;

#[cfg(feature = "runtime")]
mod http {
    use async_trait::async_trait;
    use reqwest::header::ACCEPT;
    use tracing::{debug, warn};

    use super::{is_retryable_status, ResultPublisher, RetryPolicy};
    use crate::config::PlatformConfig;
    use crate::error::PublishError;
    use crate::model::Serializer;

    /// Posts records as JSON to the platform URL.
    #[derive(Debug, Clone)]
    pub struct HttpPublisher {
        client: reqwest::Client,
        url: String,
        policy: RetryPolicy,
    }

    impl HttpPublisher {
        pub fn new(
            url: impl Into<String>,
            config: &PlatformConfig,
        ) -> Result<Self, PublishError> {
            let client = reqwest::Client::builder().timeout(config.timeout).build()?;
            Ok(Self {
                client,
                url: url.into(),
                policy: RetryPolicy::from(config),
            })
        }

        pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
            self.policy = policy;
            self
        }

        pub fn url(&self) -> &str {
            &self.url
        }

        async fn attempt(&self, body: &str) -> Result<(), PublishError> {
            let response = self
                .client
                .post(&self.url)
                .header(ACCEPT, "application/json")
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_owned())
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(PublishError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn should_retry(err: &PublishError) -> bool {
        match err {
            PublishError::Transport(_) => true,
            PublishError::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    #[async_trait]
    impl ResultPublisher for HttpPublisher {
        async fn post(&self, record: &Serializer) -> Result<(), PublishError> {
            let body = serde_json::to_string(record)?;
            debug!(url = %self.url, payload = %body, "posting canonical record");

            let mut retry = 0;
            loop {
                match self.attempt(&body).await {
                    Ok(()) => return Ok(()),
                    Err(err) if retry < self.policy.retry_count && should_retry(&err) => {
                        let wait = self.policy.backoff(retry);
                        retry += 1;
                        warn!(
                            attempt = retry,
                            wait_ms = wait.as_millis() as u64,
                            error = %err,
                            "retrying publish"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }
}
