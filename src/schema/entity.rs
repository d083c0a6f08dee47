//! Entity schema declarations
//!
//! An [`EntitySchema`] is the static field map of one entity type: its table,
//! primary key, logical fields and the relations that dotted paths may
//! traverse. Schemas are declared once at startup:
//!
//! ```rust,ignore
//! let order = EntitySchema::new("Order", "orders")
//!     .field("id", "id", FieldType::Integer)
//!     .field("status", "status", FieldType::Text)
//!     .field("amount", "amount", FieldType::Real)
//!     .nested("orderItems", "OrderItem", "id", "order_id")
//!     .reference("category", "Category", "category_code", "code");
//! ```

use super::field::{FieldDef, FieldType};

/// How a relation is joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// One-to-many child rows owned by the parent
    NestedCollection,
    /// Many-to-one link to an independently owned entity, joined by alias
    AggregateReference,
}

impl RelationKind {
    pub fn is_collection(self) -> bool {
        matches!(self, RelationKind::NestedCollection)
    }
}

/// A traversable link from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Path segment used in dotted field paths
    pub name: String,
    pub kind: RelationKind,
    /// Name of the target entity
    pub target: String,
    /// Column on the owning row
    pub source_column: String,
    /// Column on the target row
    pub target_column: String,
}

/// Static field map of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) primary_key: String,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) relations: Vec<Relation>,
}

impl EntitySchema {
    /// Start a schema for `name` stored in `table`. The primary key defaults to `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Name the logical field that identifies a row
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }

    /// Map a logical field to a column
    pub fn field(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        self.fields.push(FieldDef::new(name, column, field_type));
        self
    }

    /// Declare a nested collection: rows of `target` whose `target_column`
    /// equals this row's `source_column`.
    pub fn nested(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.relation(
            name,
            RelationKind::NestedCollection,
            target,
            source_column,
            target_column,
        )
    }

    /// Declare an aggregate reference alias. The join is made on the column
    /// pair whether or not a foreign key constraint exists.
    pub fn reference(
        self,
        alias: impl Into<String>,
        target: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.relation(
            alias,
            RelationKind::AggregateReference,
            target,
            source_column,
            target_column,
        )
    }

    fn relation(
        mut self,
        name: impl Into<String>,
        kind: RelationKind,
        target: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.relations.push(Relation {
            name: name.into(),
            kind,
            target: target.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn find_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// The primary key field definition, if it was declared
    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        self.find_field(&self.primary_key)
    }
}
