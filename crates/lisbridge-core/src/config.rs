use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_APP_NAME: &str = "lisbridge";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GRACEFUL_SECS: u64 = 10;
pub const DEFAULT_PLATFORM_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_WAIT_SECS: u64 = 5;
pub const DEFAULT_RETRY_MAX_WAIT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "development" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" => Ok(Environment::Production),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how canonical records are posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub url: Option<String>,
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_wait: Duration,
    pub retry_max_wait: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(DEFAULT_PLATFORM_TIMEOUT_SECS),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_wait: Duration::from_secs(DEFAULT_RETRY_WAIT_SECS),
            retry_max_wait: Duration::from_secs(DEFAULT_RETRY_MAX_WAIT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
    pub port: u16,
    pub graceful: Duration,
    pub app_key: Option<String>,
    pub database_url: Option<String>,
    pub platform: PlatformConfig,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = match get("APP_ENVIRONMENT") {
            Some(value) => value
                .parse::<Environment>()
                .map_err(|_| ConfigError::Invalid {
                    key: "APP_ENVIRONMENT",
                    value,
                })?,
            None => Environment::default(),
        };

        Ok(Self {
            name: get("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            environment,
            port: parse_or(&get, "APP_PORT", DEFAULT_PORT)?,
            graceful: Duration::from_secs(parse_or(&get, "APP_GRACEFUL", DEFAULT_GRACEFUL_SECS)?),
            app_key: get("APP_KEY"),
            database_url: get("DATABASE_URL").or_else(|| get("LISBRIDGE_DATABASE_URL")),
            platform: PlatformConfig {
                url: get("LIS_PLATFORM_URL"),
                timeout: Duration::from_secs(parse_or(
                    &get,
                    "LIS_PLATFORM_TIMEOUT_SECS",
                    DEFAULT_PLATFORM_TIMEOUT_SECS,
                )?),
                retry_count: parse_or(&get, "LIS_PLATFORM_RETRY_COUNT", DEFAULT_RETRY_COUNT)?,
                retry_wait: Duration::from_secs(parse_or(
                    &get,
                    "LIS_PLATFORM_RETRY_WAIT_SECS",
                    DEFAULT_RETRY_WAIT_SECS,
                )?),
                retry_max_wait: Duration::from_secs(parse_or(
                    &get,
                    "LIS_PLATFORM_RETRY_MAX_WAIT_SECS",
                    DEFAULT_RETRY_MAX_WAIT_SECS,
                )?),
            },
        })
    }

    pub fn require_app_key(&self) -> Result<&str, ConfigError> {
        self.app_key.as_deref().ok_or(ConfigError::Missing("APP_KEY"))
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }

    pub fn require_platform_url(&self) -> Result<&str, ConfigError> {
        self.platform
            .url
            .as_deref()
            .ok_or(ConfigError::Missing("LIS_PLATFORM_URL"))
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
