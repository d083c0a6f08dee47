//! Query engine facade
//!
//! [`QueryEngine`] ties the pieces together for one request:
//! resolve the target shape, ask the predicate provider for an injected
//! predicate, compile, then hand the plan to the executor.
//!
//! ```rust,ignore
//! let engine = QueryEngine::new(registry, EngineConfig::default(), executor);
//! engine.set_predicate_provider(TenantScope::new("tenantId", "acme"));
//!
//! let page = engine.search("Order", Some("OrderSummary"), &params).await?;
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::EngineConfig;
use crate::db::{QueryExecutor, RecordStream};
use crate::error::{QueryError, Result};
use crate::mapper::{RowLayout, TargetShape};
use crate::pagination::Page;
use crate::query::{CompiledQuery, PredicateProvider, QueryCompiler, SearchParams, SearchRequest};
use crate::record::Record;
use crate::schema::{ProjectionPlan, SchemaRegistry};

/// Compiles and executes searches against a frozen registry.
pub struct QueryEngine {
    registry: Arc<SchemaRegistry>,
    config: EngineConfig,
    executor: Arc<dyn QueryExecutor>,
    provider: RwLock<Option<Arc<dyn PredicateProvider>>>,
}

impl QueryEngine {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        config: EngineConfig,
        executor: impl QueryExecutor + 'static,
    ) -> Self {
        Self {
            registry,
            config,
            executor: Arc::new(executor),
            provider: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Install the provider consulted on every compile, replacing any previous one
    pub fn set_predicate_provider(&self, provider: impl PredicateProvider + 'static) {
        *self.provider.write() = Some(Arc::new(provider));
    }

    pub fn clear_predicate_provider(&self) {
        *self.provider.write() = None;
    }

    /// Look up a registered projection
    pub fn projection(&self, entity: &str, name: &str) -> Result<Arc<ProjectionPlan>> {
        self.registry.projection(entity, name)
    }

    fn shape(&self, entity: &str, projection: Option<&str>) -> Result<TargetShape> {
        match projection {
            Some(name) => Ok(TargetShape::Projection(self.projection(entity, name)?)),
            None => {
                self.registry.entity(entity)?;
                Ok(TargetShape::Entity)
            }
        }
    }

    /// Compile `params` for `entity`, including the injected predicate.
    pub fn compile(&self, entity: &str, params: &SearchParams) -> Result<CompiledQuery> {
        // Clone the provider out so no lock is held while it runs.
        let provider = self.provider.read().clone();
        let injected = provider.and_then(|p| p.predicate());
        QueryCompiler::new(&self.registry, &self.config).compile(entity, params, injected.as_ref())
    }

    fn prepare(
        &self,
        entity: &str,
        projection: Option<&str>,
        params: &SearchParams,
    ) -> Result<(CompiledQuery, Arc<RowLayout>)> {
        let shape = self.shape(entity, projection)?;
        let query = self.compile(entity, params)?;
        let layout = RowLayout::new(&self.registry, entity, &shape)?;
        Ok((query, Arc::new(layout)))
    }

    /// Run a paged search.
    pub async fn search(
        &self,
        entity: &str,
        projection: Option<&str>,
        params: &SearchParams,
    ) -> Result<Page<Record>> {
        if params.unpaged {
            return Err(QueryError::InvalidFilterCriteria(
                "unpaged searches must use stream()".to_string(),
            ));
        }
        let (query, layout) = self.prepare(entity, projection, params)?;
        debug!(entity, projection, "Running paged search");
        self.executor.paginate(query, layout).await
    }

    /// Stream every matching record, ignoring `page` and `size`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream(
        &self,
        entity: &str,
        projection: Option<&str>,
        params: &SearchParams,
    ) -> Result<RecordStream> {
        let mut params = params.clone();
        params.unpaged = true;
        let (query, layout) = self.prepare(entity, projection, &params)?;
        debug!(entity, projection, "Running unpaged search");
        Ok(self.executor.stream(query, layout))
    }

    /// Run a paged search from its wire representation
    pub async fn search_request(&self, entity: &str, request: SearchRequest) -> Result<Page<Record>> {
        let projection = request.projection.clone();
        let params = request.into_params(self.config.default_page_size)?;
        self.search(entity, projection.as_deref(), &params).await
    }
}
