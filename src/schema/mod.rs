//! Entity schemas, projections and the field resolver
//!
//! Field mappings replace runtime introspection: every entity declares its
//! table, columns and relations up front, and every projection declares its
//! fields and computed closures. The declarations are validated and indexed
//! once by [`RegistryBuilder::freeze`].

mod entity;
mod field;
mod projection;
pub mod registry;

pub use entity::{EntitySchema, Relation, RelationKind};
pub use field::{FieldDef, FieldType};
pub use projection::{
    CollectionField, CollectionPlan, ComputeFn, ComputedField, ProjectedColumn, Projection,
    ProjectionPlan,
};
pub use registry::{JoinHop, RegistryBuilder, ResolvedField, SchemaRegistry};
