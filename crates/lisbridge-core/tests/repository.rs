#![cfg(feature = "runtime")]

use std::env;

use anyhow::Result;
use lisbridge_core::{
    db, DeviceMessageRepository, InMemoryDeviceMessageRepository, PostgresDeviceMessageRepository,
    RawDeviceMessage, RepositoryError,
};
use uuid::Uuid;

#[tokio::test]
async fn in_memory_round_trip_and_missing_row() -> Result<()> {
    let repository = InMemoryDeviceMessageRepository::new();
    let stored = repository
        .create(&RawDeviceMessage::new("DEV-1", "COBAS", "hl7", "MSH|^~\\&"))
        .await?;

    assert_eq!(repository.fetch(stored.id).await?, stored);
    assert_eq!(stored.created_at, stored.updated_at);

    let missing = Uuid::new_v4();
    let err = repository.fetch(missing).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(id) if id == missing));
    Ok(())
}

#[tokio::test]
async fn postgres_repository_persists_messages() -> Result<()> {
    let database_url = match env::var("LISBRIDGE_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping postgres_repository_persists_messages because LISBRIDGE_TEST_DATABASE_URL is not set"
            );
            return Ok(());
        }
    };

    let pool = db::connect(&database_url, 2).await?;
    db::run_migrations(&pool).await?;
    let repository = PostgresDeviceMessageRepository::new(pool);
    repository.ping().await?;

    let raw = RawDeviceMessage::new("URINE-7", "URIT-500B", "rs232", "NO.1 2024-01-15\nSG 1.015");
    let stored = repository.create(&raw).await?;
    let fetched = repository.fetch(stored.id).await?;

    assert_eq!(fetched.id, stored.id);
    assert_eq!(fetched.device_id, raw.device_id);
    assert_eq!(fetched.message, raw.message);
    assert_eq!(fetched.protocol, "rs232");

    sqlx::query("DELETE FROM device_messages WHERE id = $1")
        .bind(stored.id)
        .execute(repository.pool())
        .await?;

    let err = repository.fetch(stored.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
    Ok(())
}
