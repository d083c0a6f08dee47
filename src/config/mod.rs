//! Engine and database configuration

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

/// Limits applied while compiling and executing queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest page size a caller may request
    pub max_page_size: u32,

    /// Page size used when a request does not specify one
    pub default_page_size: u32,

    /// Maximum nesting depth of a filter tree (a single leaf is depth 1)
    pub max_criteria_depth: usize,

    /// Maximum number of relations one dotted path may cross
    pub max_join_depth: usize,

    /// Records buffered between the database task and an unpaged stream consumer
    pub stream_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            default_page_size: 20,
            max_criteria_depth: 16,
            max_join_depth: 4,
            stream_buffer: 64,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            max_page_size: env_or("PREBOOT_QUERY_MAX_PAGE_SIZE", defaults.max_page_size)?,
            default_page_size: env_or(
                "PREBOOT_QUERY_DEFAULT_PAGE_SIZE",
                defaults.default_page_size,
            )?,
            max_criteria_depth: env_or(
                "PREBOOT_QUERY_MAX_CRITERIA_DEPTH",
                defaults.max_criteria_depth,
            )?,
            max_join_depth: env_or("PREBOOT_QUERY_MAX_JOIN_DEPTH", defaults.max_join_depth)?,
            stream_buffer: env_or("PREBOOT_QUERY_STREAM_BUFFER", defaults.stream_buffer)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could never serve a request
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            bail!("max_page_size must be positive");
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            bail!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.max_page_size
            );
        }
        if self.max_criteria_depth == 0 {
            bail!("max_criteria_depth must be positive");
        }
        if self.stream_buffer == 0 {
            bail!("stream_buffer must be positive");
        }
        Ok(())
    }
}

/// Connection settings for the SQLite adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g. `sqlite://data/app.db` or `sqlite::memory:`)
    pub database_url: String,

    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let database_url = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "sqlite::memory:".to_string());

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
        })
    }
}
