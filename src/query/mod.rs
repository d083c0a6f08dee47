//! Query compilation
//!
//! - [`params`]: caller-facing search parameters and the JSON wire format
//! - [`compiler`]: criteria + sort + page into a [`CompiledQuery`]
//! - [`plan`]: the backend-neutral plan the executor consumes
//! - [`tenant`]: providers for the injected predicate

mod coerce;
pub mod compiler;
pub mod params;
pub mod plan;
pub mod tenant;

pub use coerce::format_timestamp;
pub use compiler::QueryCompiler;
pub use params::{FilterInput, SearchParams, SearchRequest, SortDirection};
pub use plan::{
    ColumnRef, CompareOp, CompiledQuery, Join, OrderBy, Paging, Predicate, ROOT_ALIAS, SqlValue,
};
pub use tenant::{PredicateProvider, TenantScope};
