//! Schema registry and field resolution
//!
//! The registry has a two-phase lifecycle:
//! 1. [`RegistryBuilder`] is open for registration at startup.
//! 2. [`RegistryBuilder::freeze`] validates every declaration and produces an
//!    immutable [`SchemaRegistry`] that is shared read-only for the rest of the
//!    process. No locks are taken after freezing.
//!
//! Freezing also precomputes the path index of every entity: each dotted
//! path reachable through at most `max_join_depth` relations is resolved once
//! into an `Arc<ResolvedField>`. Resolving a path afterwards is a map lookup
//! and always returns the same `Arc`. The hop limit also bounds traversal of
//! self-referential relations.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::info;

use super::entity::{EntitySchema, Relation, RelationKind};
use super::field::FieldType;
use super::projection::{CollectionPlan, ProjectedColumn, Projection, ProjectionPlan};
use crate::config::EngineConfig;
use crate::error::{QueryError, Result};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

static GLOBAL_REGISTRY: OnceCell<Arc<SchemaRegistry>> = OnceCell::new();

/// Install the process-wide registry. Can only happen once.
pub fn install(registry: SchemaRegistry) -> Result<Arc<SchemaRegistry>> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(registry.clone())
        .map_err(|_| QueryError::Registration("global registry is already installed".into()))?;
    info!(entities = registry.entities.len(), "Installed global schema registry");
    Ok(registry)
}

/// The process-wide registry, if one was installed
pub fn global() -> Option<Arc<SchemaRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}

// ============================================================================
// Resolved paths
// ============================================================================

/// One relation crossed by a dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinHop {
    /// Relation path from the root entity (e.g. `orderItems`, `category.parent`)
    pub path: String,
    pub kind: RelationKind,
    pub target_entity: String,
    pub table: String,
    /// Column on the parent side of the join
    pub source_column: String,
    /// Column on the joined table
    pub target_column: String,
}

impl JoinHop {
    /// Relation path of the parent hop, `None` when joined to the root
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rsplit_once('.').map(|(parent, _)| parent)
    }
}

/// A logical path resolved to a physical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Root entity the path was resolved from
    pub entity: String,
    /// The dotted logical path
    pub path: String,
    /// Column on the table that owns the terminal field
    pub column: String,
    pub field_type: FieldType,
    /// Relations crossed from the root, outermost first
    pub hops: Vec<JoinHop>,
}

impl ResolvedField {
    /// True if any crossed relation is a nested collection
    pub fn crosses_collection(&self) -> bool {
        self.hops.iter().any(|h| h.kind.is_collection())
    }

    /// The hop owning the column, `None` for root columns
    pub fn last_hop(&self) -> Option<&JoinHop> {
        self.hops.last()
    }
}

// ============================================================================
// Builder (open phase)
// ============================================================================

/// Collects entity and projection declarations before freezing.
#[derive(Debug)]
pub struct RegistryBuilder {
    entities: Vec<EntitySchema>,
    projections: Vec<Projection>,
    max_join_depth: usize,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            projections: Vec::new(),
            max_join_depth: EngineConfig::default().max_join_depth,
        }
    }

    /// Use the join-depth limit from an engine configuration
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.max_join_depth = config.max_join_depth;
        self
    }

    /// Maximum number of relations a single path may cross
    pub fn with_max_join_depth(mut self, depth: usize) -> Self {
        self.max_join_depth = depth;
        self
    }

    pub fn register_entity(mut self, schema: EntitySchema) -> Self {
        self.entities.push(schema);
        self
    }

    pub fn register_projection(mut self, projection: Projection) -> Self {
        self.projections.push(projection);
        self
    }

    /// Validate all declarations and produce the immutable registry.
    pub fn freeze(self) -> Result<SchemaRegistry> {
        let mut schemas: HashMap<String, EntitySchema> = HashMap::new();
        for schema in self.entities {
            validate_entity(&schema)?;
            if schemas.contains_key(&schema.name) {
                return Err(QueryError::Registration(format!(
                    "entity '{}' registered twice",
                    schema.name
                )));
            }
            schemas.insert(schema.name.clone(), schema);
        }

        for schema in schemas.values() {
            for relation in &schema.relations {
                if !schemas.contains_key(&relation.target) {
                    return Err(QueryError::Registration(format!(
                        "relation '{}.{}' targets unknown entity '{}'",
                        schema.name, relation.name, relation.target
                    )));
                }
            }
        }

        let mut entities = HashMap::with_capacity(schemas.len());
        for schema in schemas.values() {
            let paths = index_paths(&schemas, schema, self.max_join_depth);
            let root_fields = schema
                .fields
                .iter()
                .map(|f| paths[&f.name].clone())
                .collect::<Vec<_>>();
            let primary_key = paths[&schema.primary_key].clone();
            entities.insert(
                schema.name.clone(),
                EntityIndex {
                    schema: schema.clone(),
                    paths,
                    root_fields,
                    primary_key,
                    projections: HashMap::new(),
                },
            );
        }

        let mut registry = SchemaRegistry {
            entities,
            max_join_depth: self.max_join_depth,
        };

        // Child projections (no collections) first, so parents can link them.
        let (flat, nested): (Vec<_>, Vec<_>) = self
            .projections
            .into_iter()
            .partition(|p| p.collections.is_empty());
        for projection in flat.into_iter().chain(nested) {
            let plan = registry.plan_projection(&projection)?;
            let index = registry
                .entities
                .get_mut(&projection.entity)
                .ok_or_else(|| {
                    QueryError::Registration(format!(
                        "projection '{}' targets unknown entity '{}'",
                        projection.name, projection.entity
                    ))
                })?;
            if index.projections.contains_key(&projection.name) {
                return Err(QueryError::Registration(format!(
                    "projection '{}' registered twice for '{}'",
                    projection.name, projection.entity
                )));
            }
            index.projections.insert(projection.name, Arc::new(plan));
        }

        let path_count: usize = registry.entities.values().map(|e| e.paths.len()).sum();
        info!(
            entities = registry.entities.len(),
            paths = path_count,
            max_join_depth = registry.max_join_depth,
            "Schema registry frozen"
        );
        Ok(registry)
    }
}

fn check_identifier(kind: &str, owner: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(QueryError::Registration(format!(
            "invalid {} '{}' on '{}'",
            kind, name, owner
        )))
    }
}

fn validate_entity(schema: &EntitySchema) -> Result<()> {
    check_identifier("entity name", &schema.name, &schema.name)?;
    check_identifier("table name", &schema.name, &schema.table)?;

    let mut names: Vec<&str> = Vec::new();
    for field in &schema.fields {
        check_identifier("field name", &schema.name, &field.name)?;
        check_identifier("column", &schema.name, &field.column)?;
        if names.contains(&field.name.as_str()) {
            return Err(QueryError::Registration(format!(
                "field '{}' declared twice on '{}'",
                field.name, schema.name
            )));
        }
        names.push(&field.name);
    }
    for relation in &schema.relations {
        check_identifier("relation name", &schema.name, &relation.name)?;
        check_identifier("join column", &schema.name, &relation.source_column)?;
        check_identifier("join column", &schema.name, &relation.target_column)?;
        if names.contains(&relation.name.as_str()) {
            return Err(QueryError::Registration(format!(
                "relation '{}' clashes with another name on '{}'",
                relation.name, schema.name
            )));
        }
        names.push(&relation.name);
    }

    match schema.primary_key_field() {
        Some(pk) if pk.field_type.is_array() => Err(QueryError::Registration(format!(
            "primary key '{}' of '{}' cannot be an array",
            pk.name, schema.name
        ))),
        Some(_) => Ok(()),
        None => Err(QueryError::Registration(format!(
            "primary key '{}' is not a declared field of '{}'",
            schema.primary_key, schema.name
        ))),
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn hop_for(prefix: &str, relation: &Relation, target: &EntitySchema) -> JoinHop {
    JoinHop {
        path: join_path(prefix, &relation.name),
        kind: relation.kind,
        target_entity: target.name.clone(),
        table: target.table.clone(),
        source_column: relation.source_column.clone(),
        target_column: relation.target_column.clone(),
    }
}

/// Resolve every reachable path of `root` within `max_hops` relations.
fn index_paths(
    schemas: &HashMap<String, EntitySchema>,
    root: &EntitySchema,
    max_hops: usize,
) -> HashMap<String, Arc<ResolvedField>> {
    let mut out = HashMap::new();
    let mut stack: Vec<(String, &EntitySchema, Vec<JoinHop>)> =
        vec![(String::new(), root, Vec::new())];

    while let Some((prefix, entity, hops)) = stack.pop() {
        for field in &entity.fields {
            let path = join_path(&prefix, &field.name);
            out.insert(
                path.clone(),
                Arc::new(ResolvedField {
                    entity: root.name.clone(),
                    path,
                    column: field.column.clone(),
                    field_type: field.field_type,
                    hops: hops.clone(),
                }),
            );
        }

        if hops.len() >= max_hops {
            continue;
        }
        for relation in &entity.relations {
            // Targets were checked before indexing.
            let Some(target) = schemas.get(&relation.target) else {
                continue;
            };
            let hop = hop_for(&prefix, relation, target);
            let mut next = hops.clone();
            next.push(hop.clone());
            stack.push((hop.path, target, next));
        }
    }

    out
}

// ============================================================================
// Frozen registry
// ============================================================================

#[derive(Debug)]
struct EntityIndex {
    schema: EntitySchema,
    paths: HashMap<String, Arc<ResolvedField>>,
    root_fields: Vec<Arc<ResolvedField>>,
    primary_key: Arc<ResolvedField>,
    projections: HashMap<String, Arc<ProjectionPlan>>,
}

/// Immutable, shareable field mappings and projections for all entities.
#[derive(Debug)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntityIndex>,
    max_join_depth: usize,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    fn index(&self, entity: &str) -> Result<&EntityIndex> {
        self.entities
            .get(entity)
            .ok_or_else(|| QueryError::UnknownEntity(entity.to_string()))
    }

    pub fn max_join_depth(&self) -> usize {
        self.max_join_depth
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Registered entity names, sorted
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn entity(&self, entity: &str) -> Result<&EntitySchema> {
        Ok(&self.index(entity)?.schema)
    }

    /// Resolve a dotted logical path to its column and join chain.
    pub fn resolve(&self, entity: &str, path: &str) -> Result<Arc<ResolvedField>> {
        let index = self.index(entity)?;
        match index.paths.get(path) {
            Some(field) => Ok(field.clone()),
            None => Err(self.explain_miss(index, path)),
        }
    }

    /// Distinguish an unknown path from one that crosses too many relations.
    fn explain_miss(&self, index: &EntityIndex, path: &str) -> QueryError {
        let segments: Vec<&str> = path.split('.').collect();
        let mut current = &index.schema;
        for (depth, segment) in segments[..segments.len() - 1].iter().enumerate() {
            let Some(relation) = current.find_relation(segment) else {
                break;
            };
            if depth >= self.max_join_depth {
                return QueryError::InvalidFilterCriteria(format!(
                    "path '{}' crosses more than {} relations",
                    path, self.max_join_depth
                ));
            }
            match self.entities.get(&relation.target) {
                Some(target) => current = &target.schema,
                None => break,
            }
        }
        QueryError::property_not_found(&index.schema.name, path)
    }

    /// The primary key column of an entity
    pub fn primary_key(&self, entity: &str) -> Result<Arc<ResolvedField>> {
        Ok(self.index(entity)?.primary_key.clone())
    }

    /// The entity's own columns in declaration order
    pub fn root_fields(&self, entity: &str) -> Result<&[Arc<ResolvedField>]> {
        Ok(&self.index(entity)?.root_fields)
    }

    pub fn projection(&self, entity: &str, name: &str) -> Result<Arc<ProjectionPlan>> {
        self.index(entity)?
            .projections
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownProjection {
                entity: entity.to_string(),
                name: name.to_string(),
            })
    }

    fn plan_projection(&self, projection: &Projection) -> Result<ProjectionPlan> {
        let reject = |msg: String| {
            QueryError::Registration(format!(
                "projection '{}' of '{}': {}",
                projection.name, projection.entity, msg
            ))
        };

        let Some(index) = self.entities.get(&projection.entity) else {
            return Err(reject("unknown entity".to_string()));
        };

        let mut outputs: Vec<&str> = Vec::new();
        let output_names = projection
            .fields
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(projection.collections.iter().map(|c| c.name.as_str()))
            .chain(projection.computed.iter().map(|c| c.name.as_str()));
        for name in output_names {
            if !IDENTIFIER.is_match(name) || outputs.contains(&name) {
                return Err(reject(format!("invalid or duplicate output name '{}'", name)));
            }
            outputs.push(name);
        }

        let mut columns = Vec::with_capacity(projection.fields.len());
        for (name, path) in &projection.fields {
            let Some(field) = index.paths.get(path) else {
                return Err(reject(format!("unknown field path '{}'", path)));
            };
            if field.crosses_collection() {
                return Err(reject(format!(
                    "'{}' crosses a nested collection; declare it with collection()",
                    path
                )));
            }
            columns.push(ProjectedColumn {
                name: name.clone(),
                field: field.clone(),
            });
        }

        let mut collections = Vec::with_capacity(projection.collections.len());
        for collection in &projection.collections {
            let relation = match index.schema.find_relation(&collection.relation) {
                Some(r) if r.kind.is_collection() => r,
                _ => {
                    return Err(reject(format!(
                        "'{}' is not a nested collection",
                        collection.relation
                    )));
                }
            };
            let target = self.index(&relation.target)?;
            let Some(child) = target.projections.get(&collection.projection) else {
                return Err(reject(format!(
                    "child projection '{}' is not registered for '{}'",
                    collection.projection, relation.target
                )));
            };
            if !child.collections.is_empty() || child.columns.iter().any(|c| !c.field.hops.is_empty())
            {
                return Err(reject(format!(
                    "child projection '{}' may only use direct fields",
                    collection.projection
                )));
            }
            collections.push(CollectionPlan {
                name: collection.name.clone(),
                hop: hop_for("", relation, &target.schema),
                child_key: target.primary_key.column.clone(),
                child_key_type: target.primary_key.field_type,
                child: child.clone(),
            });
        }

        Ok(ProjectionPlan {
            entity: projection.entity.clone(),
            name: projection.name.clone(),
            columns,
            computed: projection.computed.clone(),
            collections,
        })
    }
}
