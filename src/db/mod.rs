//! SQLite execution adapter
//!
//! - [`sql`]: renders a [`CompiledQuery`](crate::query::CompiledQuery) to parameterized SQL
//! - [`executor`]: runs rendered statements (paged or streamed) over a pool
//! - [`sqlite_helpers`]: column decoding and JSON array storage

pub mod executor;
pub mod sql;
pub mod sqlite_helpers;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;

pub use executor::{QueryExecutor, RecordStream, SqliteExecutor};
pub use sql::{SelectRenderer, SqlStatement};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new database connection pool.
    ///
    /// Every connection to `sqlite::memory:` opens its own empty database, so
    /// in-memory URLs always get a single-connection pool.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let max_connections = if config.database_url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&config.database_url)
            .await
            .with_context(|| format!("Failed to connect to {}", config.database_url))?;

        info!(
            url = %config.database_url,
            max_connections,
            "Connected to database"
        );
        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Build an executor over this pool
    pub fn executor(&self, stream_buffer: usize) -> SqliteExecutor {
        SqliteExecutor::new(self.pool.clone(), stream_buffer)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
