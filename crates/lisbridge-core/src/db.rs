use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::info;

use crate::error::RepositoryError;

pub type DbPool = Pool<Postgres>;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Opens the Postgres pool that backs device message storage.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DbPool, RepositoryError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    info!(max_connections, "postgres pool established");
    Ok(pool)
}

/// Applies the migrations embedded from `migrations/`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("device message migrations applied");
    Ok(())
}

pub async fn ping(pool: &DbPool) -> Result<(), RepositoryError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
