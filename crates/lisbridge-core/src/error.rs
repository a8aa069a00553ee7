use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[cfg(feature = "runtime")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "runtime")]
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("device message '{0}' not found")]
    NotFound(uuid::Uuid),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[cfg(feature = "runtime")]
    #[error("publish transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("platform answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("publisher unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("environment variable {key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Failures the pipeline reports to its caller. Decode misses and publish failures are
/// outcomes, not errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to store device message: {0}")]
    Storage(#[from] RepositoryError),
}
