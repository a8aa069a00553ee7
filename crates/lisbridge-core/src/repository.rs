//! Storage for inbound device messages.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::model::{DeviceMessage, RawDeviceMessage};

#[async_trait]
pub trait DeviceMessageRepository: Send + Sync {
    async fn create(&self, raw: &RawDeviceMessage) -> Result<DeviceMessage, RepositoryError>;
    async fn fetch(&self, id: Uuid) -> Result<DeviceMessage, RepositoryError>;
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Keeps rows in memory. Used by tests and `decode`-style dry runs.
#[derive(Debug, Default)]
pub struct InMemoryDeviceMessageRepository {
    rows: Mutex<Vec<DeviceMessage>>,
    unavailable: Option<String>,
}

impl InMemoryDeviceMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose every call fails with [`RepositoryError::Unavailable`].
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            unavailable: Some(reason.into()),
        }
    }

    pub fn messages(&self) -> Vec<DeviceMessage> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        match &self.unavailable {
            Some(reason) => Err(RepositoryError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceMessageRepository for InMemoryDeviceMessageRepository {
    async fn create(&self, raw: &RawDeviceMessage) -> Result<DeviceMessage, RepositoryError> {
        self.check_available()?;
        let stored = DeviceMessage::from_raw(raw);
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".into()))?;
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn fetch(&self, id: Uuid) -> Result<DeviceMessage, RepositoryError> {
        self.check_available()?;
        let rows = self
            .rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".into()))?;
        rows.iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

#[cfg(feature = "runtime")]
pub use postgres::PostgresDeviceMessageRepository;

#[cfg(feature = "runtime")]
mod postgres {
    use async_trait::async_trait;
    use sqlx::Row;
    use uuid::Uuid;

    use super::DeviceMessageRepository;
    use crate::db::{self, DbPool};
    use crate::error::RepositoryError;
    use crate::model::{DeviceMessage, RawDeviceMessage};

    #[derive(Clone)]
    pub struct PostgresDeviceMessageRepository {
        pool: DbPool,
    }

    impl PostgresDeviceMessageRepository {
        pub fn new(pool: DbPool) -> Self {
            Self { pool }
        }

        pub async fn connect(
            database_url: &str,
            max_connections: u32,
        ) -> Result<Self, RepositoryError> {
            let pool = db::connect(database_url, max_connections).await?;
            Ok(Self { pool })
        }

        pub fn pool(&self) -> &DbPool {
            &self.pool
        }

        pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
            db::run_migrations(&self.pool).await
        }
    }

    #[async_trait]
    impl DeviceMessageRepository for PostgresDeviceMessageRepository {
        async fn create(&self, raw: &RawDeviceMessage) -> Result<DeviceMessage, RepositoryError> {
            let record = DeviceMessage::from_raw(raw);

            sqlx::query(
                r#"
                INSERT INTO device_messages (
                    id,
                    device_id,
                    device_type_code,
                    message,
                    protocol,
                    created_at,
                    updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(record.id)
            .bind(&record.device_id)
            .bind(&record.device_type_code)
            .bind(&record.message)
            .bind(&record.protocol)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;

            Ok(record)
        }

        async fn fetch(&self, id: Uuid) -> Result<DeviceMessage, RepositoryError> {
            let row = sqlx::query(
                r#"
                SELECT
                    id,
                    device_id,
                    device_type_code,
                    message,
                    protocol,
                    created_at,
                    updated_at
                FROM device_messages
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Err(RepositoryError::NotFound(id));
            };

            Ok(DeviceMessage {
                id: row.try_get("id")?,
                device_id: row.try_get("device_id")?,
                device_type_code: row.try_get("device_type_code")?,
                message: row.try_get("message")?,
                protocol: row.try_get("protocol")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }

        async fn ping(&self) -> Result<(), RepositoryError> {
            db::ping(&self.pool).await
        }
    }
}
