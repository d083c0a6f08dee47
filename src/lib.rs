//! preboot-query: dynamic filter criteria compiled to tenant-safe SQL
//!
//! The crate turns a caller-supplied filter tree (leaf comparisons combined
//! with AND/OR groups) into a parameterized query against a statically
//! registered schema, then executes it with paging or as a stream and maps
//! the rows into entity records or named projections.
//!
//! - [`criteria`]: the filter tree and its operators
//! - [`schema`]: entity and projection registration, field resolution
//! - [`query`]: search parameters, the compiler and the compiled plan
//! - [`db`]: SQL rendering and execution over SQLite
//! - [`mapper`]: row to record mapping, nested collection aggregation
//! - [`engine`]: the facade tying it together, including the tenant hook
//!
//! ```rust,ignore
//! let registry = SchemaRegistry::builder()
//!     .register_entity(
//!         EntitySchema::new("Order", "orders")
//!             .field("id", "id", FieldType::Integer)
//!             .field("tenantId", "tenant_id", FieldType::Text)
//!             .field("status", "status", FieldType::Text),
//!     )
//!     .freeze()?;
//!
//! let db = Database::connect(&DatabaseConfig::from_env()?).await?;
//! let engine = QueryEngine::new(Arc::new(registry), config, db.executor(64));
//! engine.set_predicate_provider(TenantScope::new("tenantId", tenant));
//!
//! let params = SearchParams::new().with_criteria(FilterCriteria::eqic("status", "completed"));
//! let page = engine.search("Order", None, &params).await?;
//! ```

pub mod config;
pub mod criteria;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod pagination;
pub mod query;
pub mod record;
pub mod schema;

#[cfg(test)]
mod fixtures;

pub use config::{DatabaseConfig, EngineConfig};
pub use criteria::{FilterCriteria, FilterValue, LogicalOperator, Operator};
pub use db::{Database, QueryExecutor, RecordStream, SqliteExecutor};
pub use engine::QueryEngine;
pub use error::{ErrorKind, QueryError, Result};
pub use mapper::TargetShape;
pub use pagination::Page;
pub use query::{
    CompiledQuery, PredicateProvider, QueryCompiler, SearchParams, SearchRequest, SortDirection,
    TenantScope,
};
pub use record::{Record, Value};
pub use schema::{EntitySchema, FieldType, Projection, RegistryBuilder, SchemaRegistry};
