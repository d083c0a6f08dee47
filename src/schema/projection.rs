//! Projection declarations
//!
//! A projection is a named, reduced view of an entity: a subset of fields
//! (possibly reached through aggregate references), computed fields
//! evaluated from the mapped values, and nested collections mapped through
//! the child entity's own projection.
//!
//! ```rust,ignore
//! let summary = Projection::new("Order", "OrderSummary")
//!     .field("id", "id")
//!     .field("categoryName", "category.name")
//!     .computed("large", |r| Value::Bool(r.f64("amount").unwrap_or(0.0) > 1000.0))
//!     .collection("items", "orderItems", "OrderItemLine");
//! ```

use std::fmt;
use std::sync::Arc;

use super::field::FieldType;
use super::registry::{JoinHop, ResolvedField};
use crate::record::{Record, Value};

/// Pure function from already-mapped fields to a derived value
pub type ComputeFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// A derived field of a projection.
#[derive(Clone)]
pub struct ComputedField {
    pub name: String,
    pub compute: ComputeFn,
}

impl fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedField")
            .field("name", &self.name)
            .field("compute", &"<fn>")
            .finish()
    }
}

/// A nested collection mapped through another projection.
#[derive(Debug, Clone)]
pub struct CollectionField {
    pub name: String,
    /// Nested-collection relation on the projected entity
    pub relation: String,
    /// Projection registered for the relation's target entity
    pub projection: String,
}

/// Projection declaration, validated when the registry is frozen.
#[derive(Debug, Clone)]
pub struct Projection {
    pub(crate) entity: String,
    pub(crate) name: String,
    pub(crate) fields: Vec<(String, String)>,
    pub(crate) computed: Vec<ComputedField>,
    pub(crate) collections: Vec<CollectionField>,
}

impl Projection {
    pub fn new(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            name: name.into(),
            fields: Vec::new(),
            computed: Vec::new(),
            collections: Vec::new(),
        }
    }

    /// Include the field at `path` under the output name `name`
    pub fn field(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.fields.push((name.into(), path.into()));
        self
    }

    /// Add a computed field. Computed fields run in declaration order after
    /// all plain fields are mapped and may read earlier computed fields.
    pub fn computed<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.computed.push(ComputedField {
            name: name.into(),
            compute: Arc::new(compute),
        });
        self
    }

    /// Aggregate a nested collection into `name` using `projection` of the child entity
    pub fn collection(
        mut self,
        name: impl Into<String>,
        relation: impl Into<String>,
        projection: impl Into<String>,
    ) -> Self {
        self.collections.push(CollectionField {
            name: name.into(),
            relation: relation.into(),
            projection: projection.into(),
        });
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A projected field resolved against the schema.
#[derive(Debug, Clone)]
pub struct ProjectedColumn {
    pub name: String,
    pub field: Arc<ResolvedField>,
}

/// A nested collection resolved against the schema.
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    pub name: String,
    pub hop: JoinHop,
    /// Primary key column of the child table, used for child ordering
    pub child_key: String,
    pub child_key_type: FieldType,
    pub child: Arc<ProjectionPlan>,
}

/// A projection with every path resolved; built at freeze time.
#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    pub entity: String,
    pub name: String,
    pub columns: Vec<ProjectedColumn>,
    pub computed: Vec<ComputedField>,
    pub collections: Vec<CollectionPlan>,
}

impl ProjectionPlan {
    /// Every distinct relation hop the projection's plain fields cross
    pub fn reference_hops(&self) -> Vec<&JoinHop> {
        let mut hops: Vec<&JoinHop> = Vec::new();
        for column in &self.columns {
            for hop in &column.field.hops {
                if !hops.iter().any(|h| h.path == hop.path) {
                    hops.push(hop);
                }
            }
        }
        hops
    }
}
