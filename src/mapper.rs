//! Result mapping
//!
//! A [`RowLayout`] describes every column the outer SELECT returns for a
//! [`TargetShape`]: where it comes from, how to decode it and what it becomes
//! in the output. The [`RecordAssembler`] turns decoded rows into
//! [`Record`]s:
//!
//! - rows of one parent arrive contiguously (the renderer orders by parent
//!   key), so a record is complete as soon as the parent key changes
//! - child rows are appended to their collection in row order; LEFT JOIN
//!   rows with no child are skipped
//! - computed fields run once a record is complete, in declaration order
//!
//! Mapping never touches the database.

use std::sync::Arc;

use crate::error::Result;
use crate::query::{ColumnRef, Join, ROOT_ALIAS};
use crate::record::{Record, Value};
use crate::schema::{ComputedField, FieldType, JoinHop, ProjectionPlan, SchemaRegistry};

/// What a search returns: full entity rows or a named projection.
#[derive(Debug, Clone)]
pub enum TargetShape {
    Entity,
    Projection(Arc<ProjectionPlan>),
}

impl TargetShape {
    pub fn name(&self) -> Option<&str> {
        match self {
            TargetShape::Entity => None,
            TargetShape::Projection(plan) => Some(&plan.name),
        }
    }
}

/// Purpose of a selected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRole {
    /// Primary key of the root row; groups rows into records
    ParentKey,
    /// Plain output field of the root record
    Field(String),
    /// Primary key of a collection row; NULL when the row has no child
    ChildKey { collection: usize },
    /// Output field of a collection's child record
    ChildField { collection: usize, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutColumn {
    /// Column alias in the outer SELECT
    pub label: String,
    pub source: ColumnRef,
    pub field_type: FieldType,
    pub role: ColumnRole,
}

#[derive(Debug, Clone)]
pub struct CollectionLayout {
    pub name: String,
    pub computed: Vec<ComputedField>,
}

/// Column layout of the outer SELECT for one target shape.
#[derive(Debug, Clone)]
pub struct RowLayout {
    columns: Vec<LayoutColumn>,
    /// Reference and collection joins off the paged root rows
    joins: Vec<Join>,
    collections: Vec<CollectionLayout>,
    computed: Vec<ComputedField>,
}

impl RowLayout {
    /// Build the layout of `shape` for rows of `entity`.
    pub fn new(registry: &SchemaRegistry, entity: &str, shape: &TargetShape) -> Result<Self> {
        let primary_key = registry.primary_key(entity)?;
        let mut layout = RowLayout {
            columns: Vec::new(),
            joins: Vec::new(),
            collections: Vec::new(),
            computed: Vec::new(),
        };
        layout.push(
            ColumnRef::root(primary_key.column.clone()),
            primary_key.field_type,
            ColumnRole::ParentKey,
        );

        match shape {
            TargetShape::Entity => {
                for field in registry.root_fields(entity)? {
                    layout.push(
                        ColumnRef::root(field.column.clone()),
                        field.field_type,
                        ColumnRole::Field(field.path.clone()),
                    );
                }
            }
            TargetShape::Projection(plan) => layout.add_projection(plan),
        }
        Ok(layout)
    }

    fn push(&mut self, source: ColumnRef, field_type: FieldType, role: ColumnRole) {
        let label = format!("c{}", self.columns.len());
        self.columns.push(LayoutColumn {
            label,
            source,
            field_type,
            role,
        });
    }

    fn join(&mut self, hop: &JoinHop, alias: String, parent_alias: String) {
        self.joins.push(Join {
            path: hop.path.clone(),
            alias,
            parent_alias,
            kind: hop.kind,
            table: hop.table.clone(),
            source_column: hop.source_column.clone(),
            target_column: hop.target_column.clone(),
        });
    }

    fn alias_of(&self, path: &str) -> Option<&str> {
        self.joins
            .iter()
            .find(|j| j.path == path)
            .map(|j| j.alias.as_str())
    }

    fn add_projection(&mut self, plan: &ProjectionPlan) {
        for (i, hop) in plan.reference_hops().into_iter().enumerate() {
            let parent = hop
                .parent_path()
                .and_then(|p| self.alias_of(p))
                .unwrap_or(ROOT_ALIAS)
                .to_string();
            self.join(hop, format!("p{}", i + 1), parent);
        }

        for column in &plan.columns {
            let alias = column
                .field
                .last_hop()
                .and_then(|hop| self.alias_of(&hop.path))
                .unwrap_or(ROOT_ALIAS)
                .to_string();
            self.push(
                ColumnRef::new(alias, column.field.column.clone()),
                column.field.field_type,
                ColumnRole::Field(column.name.clone()),
            );
        }

        for (index, collection) in plan.collections.iter().enumerate() {
            let alias = format!("c{}", index + 1);
            self.join(&collection.hop, alias.clone(), ROOT_ALIAS.to_string());
            self.push(
                ColumnRef::new(alias.clone(), collection.child_key.clone()),
                collection.child_key_type,
                ColumnRole::ChildKey { collection: index },
            );
            for column in &collection.child.columns {
                self.push(
                    ColumnRef::new(alias.clone(), column.field.column.clone()),
                    column.field.field_type,
                    ColumnRole::ChildField {
                        collection: index,
                        name: column.name.clone(),
                    },
                );
            }
            self.collections.push(CollectionLayout {
                name: collection.name.clone(),
                computed: collection.child.computed.clone(),
            });
        }

        self.computed = plan.computed.clone();
    }

    pub fn columns(&self) -> &[LayoutColumn] {
        &self.columns
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn collections(&self) -> &[CollectionLayout] {
        &self.collections
    }

    /// Child primary key columns, in collection order
    pub fn child_keys(&self) -> impl Iterator<Item = &LayoutColumn> {
        self.columns
            .iter()
            .filter(|c| matches!(c.role, ColumnRole::ChildKey { .. }))
    }
}

// ============================================================================
// Assembly
// ============================================================================

#[derive(Debug)]
struct PendingRecord {
    key: Value,
    record: Record,
    children: Vec<Vec<Record>>,
    /// Child keys already seen per collection; several collections multiply rows
    seen: Vec<Vec<Value>>,
}

/// Groups decoded rows into records, one parent at a time.
#[derive(Debug)]
pub struct RecordAssembler {
    layout: Arc<RowLayout>,
    pending: Option<PendingRecord>,
}

impl RecordAssembler {
    pub fn new(layout: Arc<RowLayout>) -> Self {
        Self {
            layout,
            pending: None,
        }
    }

    /// Feed one decoded row (values in layout column order).
    ///
    /// Returns the previous record once a row of a new parent arrives.
    pub fn push(&mut self, row: Vec<Value>) -> Option<Record> {
        let key = self.parent_key(&row);
        let same_parent = self.pending.as_ref().is_some_and(|p| p.key == key);
        let finished = if same_parent { None } else { self.finish() };

        if self.pending.is_none() {
            self.pending = Some(self.start(key, &row));
        }
        if let Some(pending) = self.pending.as_mut() {
            collect_children(&self.layout, pending, &row);
        }
        finished
    }

    /// Complete the record in progress, if any
    pub fn finish(&mut self) -> Option<Record> {
        let pending = self.pending.take()?;
        let mut record = pending.record;
        for (collection, children) in self.layout.collections.iter().zip(pending.children) {
            record.insert(collection.name.clone(), Value::Records(children));
        }
        apply_computed(&self.layout.computed, &mut record);
        Some(record)
    }

    fn parent_key(&self, row: &[Value]) -> Value {
        self.layout
            .columns
            .iter()
            .position(|c| c.role == ColumnRole::ParentKey)
            .and_then(|i| row.get(i).cloned())
            .unwrap_or(Value::Null)
    }

    fn start(&self, key: Value, row: &[Value]) -> PendingRecord {
        let mut record = Record::with_capacity(self.layout.columns.len());
        for (column, value) in self.layout.columns.iter().zip(row) {
            if let ColumnRole::Field(name) = &column.role {
                record.insert(name.clone(), value.clone());
            }
        }
        let collections = self.layout.collections.len();
        PendingRecord {
            key,
            record,
            children: vec![Vec::new(); collections],
            seen: vec![Vec::new(); collections],
        }
    }
}

fn collect_children(layout: &RowLayout, pending: &mut PendingRecord, row: &[Value]) {
    for (index, collection) in layout.collections.iter().enumerate() {
        let key = layout
            .columns
            .iter()
            .zip(row)
            .find(|(c, _)| c.role == ColumnRole::ChildKey { collection: index })
            .map(|(_, v)| v);
        let Some(key) = key.filter(|k| !k.is_null()) else {
            continue;
        };
        if pending.seen[index].contains(key) {
            continue;
        }
        pending.seen[index].push(key.clone());

        let mut child = Record::new();
        for (column, value) in layout.columns.iter().zip(row) {
            if let ColumnRole::ChildField {
                collection: owner,
                name,
            } = &column.role
            {
                if *owner == index {
                    child.insert(name.clone(), value.clone());
                }
            }
        }
        apply_computed(&collection.computed, &mut child);
        pending.children[index].push(child);
    }
}

fn apply_computed(computed: &[ComputedField], record: &mut Record) {
    for field in computed {
        let value = (field.compute)(record);
        record.insert(field.name.clone(), value);
    }
}

/// Map a batch of decoded rows into records.
pub fn map<I>(rows: I, layout: Arc<RowLayout>) -> Vec<Record>
where
    I: IntoIterator<Item = Vec<Value>>,
{
    let mut assembler = RecordAssembler::new(layout);
    let mut records = Vec::new();
    for row in rows {
        if let Some(record) = assembler.push(row) {
            records.push(record);
        }
    }
    records.extend(assembler.finish());
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use pretty_assertions::assert_eq;

    fn summary_layout() -> Arc<RowLayout> {
        let registry = fixtures::order_registry();
        let plan = registry.projection("Order", "OrderSummary").unwrap();
        Arc::new(RowLayout::new(&registry, "Order", &TargetShape::Projection(plan)).unwrap())
    }

    #[test]
    fn test_projection_layout() {
        let layout = summary_layout();
        let sources: Vec<String> = layout.columns().iter().map(|c| c.source.to_string()).collect();
        assert_eq!(
            sources,
            vec![
                r#"t0."id""#,
                r#"t0."id""#,
                r#"t0."status""#,
                r#"t0."amount""#,
                r#"p1."name""#,
                r#"c1."id""#,
                r#"c1."product_code""#,
                r#"c1."quantity""#,
            ]
        );
        let joins: Vec<(&str, &str)> = layout
            .joins()
            .iter()
            .map(|j| (j.alias.as_str(), j.table.as_str()))
            .collect();
        assert_eq!(joins, vec![("p1", "categories"), ("c1", "order_items")]);
        assert_eq!(layout.child_keys().count(), 1);
    }

    #[test]
    fn test_entity_layout_uses_all_fields() {
        let registry = fixtures::order_registry();
        let layout = RowLayout::new(&registry, "OrderItem", &TargetShape::Entity).unwrap();
        let roles: Vec<&ColumnRole> = layout.columns().iter().map(|c| &c.role).collect();
        assert_eq!(
            roles,
            vec![
                &ColumnRole::ParentKey,
                &ColumnRole::Field("id".into()),
                &ColumnRole::Field("productCode".into()),
                &ColumnRole::Field("quantity".into()),
            ]
        );
        assert!(layout.joins().is_empty());
    }

    fn summary_row(id: i64, amount: f64, item: Option<(i64, &str, i64)>) -> Vec<Value> {
        let (item_id, code, qty) = match item {
            Some((i, c, q)) => (Value::Int(i), Value::Text(c.into()), Value::Int(q)),
            None => (Value::Null, Value::Null, Value::Null),
        };
        vec![
            Value::Int(id),
            Value::Int(id),
            Value::Text("COMPLETED".into()),
            Value::Float(amount),
            Value::Text("Books".into()),
            item_id,
            code,
            qty,
        ]
    }

    #[test]
    fn test_children_aggregate_in_row_order() {
        let rows = vec![
            summary_row(1, 1500.0, Some((11, "B", 2))),
            summary_row(1, 1500.0, Some((10, "A", 1))),
            summary_row(2, 10.0, None),
            summary_row(3, 20.0, Some((12, "C", 5))),
        ];
        let records = map(rows, summary_layout());
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.i64("id"), Some(1));
        assert_eq!(first.str("categoryName"), Some("Books"));
        assert_eq!(first.str("size"), Some("LARGE"));
        let labels: Vec<&str> = first
            .records("items")
            .iter()
            .filter_map(|r| r.str("label"))
            .collect();
        assert_eq!(labels, vec!["B x2", "A x1"]);

        assert!(records[1].records("items").is_empty());
        assert_eq!(records[1].str("size"), Some("SMALL"));
        assert_eq!(records[2].records("items").len(), 1);

        let names: Vec<&str> = first.names().collect();
        assert_eq!(
            names,
            vec!["id", "status", "amount", "categoryName", "items", "size"]
        );
    }

    #[test]
    fn test_repeated_child_rows_are_deduplicated() {
        let rows = vec![
            summary_row(1, 5.0, Some((10, "A", 1))),
            summary_row(1, 5.0, Some((10, "A", 1))),
        ];
        let records = map(rows, summary_layout());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].records("items").len(), 1);
    }

    #[test]
    fn test_assembler_emits_on_key_change() {
        let mut assembler = RecordAssembler::new(summary_layout());
        assert!(assembler.push(summary_row(1, 5.0, None)).is_none());
        let done = assembler.push(summary_row(2, 6.0, None)).unwrap();
        assert_eq!(done.i64("id"), Some(1));
        assert_eq!(assembler.finish().and_then(|r| r.i64("id")), Some(2));
        assert!(assembler.finish().is_none());
    }
}
