use std::sync::Arc;

use anyhow::{Context, Result};
use lisbridge_core::{
    AppConfig, DeviceMessagePipeline, DeviceMessageRepository, HttpPublisher,
    PostgresDeviceMessageRepository, ResultPublisher,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: DeviceMessagePipeline,
    pub app_key: Arc<str>,
}

impl AppState {
    pub fn new(pipeline: DeviceMessagePipeline, app_key: impl Into<Arc<str>>) -> Self {
        Self {
            pipeline,
            app_key: app_key.into(),
        }
    }

    /// Wires Postgres storage and the HTTP publisher from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let pipeline = connect_pipeline(config).await?;
        let app_key = config.require_app_key()?;
        Ok(Self::new(pipeline, app_key))
    }

    pub fn repository(&self) -> &Arc<dyn DeviceMessageRepository> {
        self.pipeline.repository()
    }
}

pub async fn connect_pipeline(config: &AppConfig) -> Result<DeviceMessagePipeline> {
    let database_url = config
        .require_database_url()
        .context("DATABASE_URL (or LISBRIDGE_DATABASE_URL) must be set")?;
    let repository = PostgresDeviceMessageRepository::connect(
        database_url,
        lisbridge_core::db::DEFAULT_MAX_CONNECTIONS,
    )
    .await
    .context("failed to open device message storage")?;

    let platform_url = config
        .require_platform_url()
        .context("LIS_PLATFORM_URL must be set")?;
    let publisher = HttpPublisher::new(platform_url, &config.platform)
        .context("failed to build platform client")?;

    let repository: Arc<dyn DeviceMessageRepository> = Arc::new(repository);
    let publisher: Arc<dyn ResultPublisher> = Arc::new(publisher);
    Ok(DeviceMessagePipeline::new(repository, publisher))
}
