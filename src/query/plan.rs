//! Backend-neutral compiled query plan
//!
//! A [`CompiledQuery`] mirrors the caller's filter tree with physical names
//! and typed bind values. It is created fresh per call, never mutated, and
//! handed by value to an executor.

use std::fmt;

use crate::schema::RelationKind;

use super::params::SortDirection;

/// Alias of the root table in every compiled query
pub const ROOT_ALIAS: &str = "t0";

/// Represents a SQL value that can be bound to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::String(s) => write!(f, "'{}'", s),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

/// A column qualified by its table alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }

    pub fn root(column: impl Into<String>) -> Self {
        Self::new(ROOT_ALIAS, column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.\"{}\"", self.alias, self.column)
    }
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
        }
    }
}

/// Predicate tree over physical columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: SqlValue,
    },
    /// Both sides lower-cased before comparison
    EqualsIgnoreCase { column: ColumnRef, value: String },
    /// `pattern` already contains the `%` wildcards; user wildcards are escaped with `\`
    Like {
        column: ColumnRef,
        pattern: String,
        case_insensitive: bool,
    },
    Between {
        column: ColumnRef,
        low: SqlValue,
        high: SqlValue,
    },
    In {
        column: ColumnRef,
        values: Vec<SqlValue>,
    },
    /// Stored array shares at least one element with `values`
    ArrayOverlap {
        column: ColumnRef,
        values: Vec<SqlValue>,
    },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
}

impl Predicate {
    /// Number of bind values this predicate needs
    pub fn bind_count(&self) -> usize {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::bind_count).sum()
            }
            Predicate::Compare { .. }
            | Predicate::EqualsIgnoreCase { .. }
            | Predicate::Like { .. } => 1,
            Predicate::Between { .. } => 2,
            Predicate::In { values, .. } | Predicate::ArrayOverlap { values, .. } => values.len(),
            Predicate::IsNull(_) | Predicate::IsNotNull(_) => 0,
        }
    }
}

/// A join required by a filter or sort path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Relation path that introduced the join (e.g. `orderItems`)
    pub path: String,
    pub alias: String,
    pub parent_alias: String,
    pub kind: RelationKind,
    pub table: String,
    /// Column on the parent alias
    pub source_column: String,
    /// Column on the joined table
    pub target_column: String,
}

/// A single ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// Row window of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// A single page: `LIMIT size OFFSET offset`
    Offset { page: u32, size: u32, offset: u64 },
    /// Every matching row, streamed
    Unpaged,
}

/// Immutable query plan produced by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub(crate) entity: String,
    pub(crate) table: String,
    pub(crate) primary_key: String,
    pub(crate) joins: Vec<Join>,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) paging: Paging,
}

impl CompiledQuery {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key column of the root table
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Deduplicated joins in first-use order
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Root predicate, `None` when every row matches
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn paging(&self) -> Paging {
        self.paging
    }

    pub fn is_unpaged(&self) -> bool {
        matches!(self.paging, Paging::Unpaged)
    }

    pub fn has_collection_join(&self) -> bool {
        self.joins.iter().any(|j| j.kind.is_collection())
    }

    /// Any join may multiply root rows (a collection, or a reference to a
    /// non-unique column), so results must be grouped by the primary key
    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }
}
