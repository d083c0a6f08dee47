//! SQL rendering for compiled queries
//!
//! Every search renders to two statements sharing the same predicate:
//!
//! ```sql
//! -- page
//! SELECT <shape columns>
//! FROM (SELECT t0.*, MIN(<sort>) AS "__sort"
//!       FROM orders t0 LEFT JOIN ... WHERE ... GROUP BY t0."id"
//!       ORDER BY "__sort", t0."id" LIMIT ?N OFFSET ?M) AS t0
//! LEFT JOIN <projection joins>
//! ORDER BY "__sort", t0."id", c1."id"
//!
//! -- count
//! SELECT COUNT(DISTINCT t0."id") FROM orders t0 LEFT JOIN ... WHERE ...
//! ```
//!
//! Paging happens on root rows in the inner query. Any filter or sort join
//! can multiply root rows (a nested collection, or a reference whose target
//! column is not unique), so whenever one is present the inner query groups
//! by the primary key and the count is distinct. Values are always bound as
//! numbered `?N` parameters; identifiers come from the frozen registry.

use std::fmt::Write as _;

use sqlx::sqlite::SqliteArguments;

use super::sqlite_helpers::json_array_overlaps_sql;
use crate::mapper::RowLayout;
use crate::query::{CompiledQuery, Join, Paging, Predicate, ROOT_ALIAS, SortDirection, SqlValue};

/// Column exporting the sort expression from the inner query
const SORT_COLUMN: &str = "__sort";

impl SqlValue {
    /// Bind this value to a sqlx query.
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    /// Bind this value to a sqlx count query.
    pub fn bind_to_scalar<'q>(
        &'q self,
        query: sqlx::query::QueryScalar<'q, sqlx::Sqlite, i64, SqliteArguments<'q>>,
    ) -> sqlx::query::QueryScalar<'q, sqlx::Sqlite, i64, SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

/// A rendered statement and its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

impl SqlStatement {
    /// Build a sqlx query with every value bound
    pub fn query(&self) -> sqlx::query::Query<'_, sqlx::Sqlite, SqliteArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for value in &self.binds {
            query = value.bind_to_query(query);
        }
        query
    }

    /// Build a sqlx `COUNT` query with every value bound
    pub fn count_query(&self) -> sqlx::query::QueryScalar<'_, sqlx::Sqlite, i64, SqliteArguments<'_>> {
        let mut query = sqlx::query_scalar::<_, i64>(&self.sql);
        for value in &self.binds {
            query = value.bind_to_scalar(query);
        }
        query
    }
}

/// Renders compiled queries to SQLite SQL.
pub struct SelectRenderer<'a> {
    query: &'a CompiledQuery,
    sql: String,
    binds: Vec<SqlValue>,
}

impl<'a> SelectRenderer<'a> {
    pub fn new(query: &'a CompiledQuery) -> Self {
        Self {
            query,
            sql: String::new(),
            binds: Vec::new(),
        }
    }

    /// Render the page (or unpaged stream) statement for `layout`.
    pub fn select(mut self, layout: &RowLayout) -> SqlStatement {
        self.sql.push_str("SELECT ");
        let columns: Vec<String> = layout
            .columns()
            .iter()
            .map(|c| format!("{} AS \"{}\"", c.source, c.label))
            .collect();
        self.sql.push_str(&columns.join(", "));

        self.sql.push_str(" FROM (");
        self.inner_select();
        let _ = write!(self.sql, ") AS {}", ROOT_ALIAS);

        for join in layout.joins() {
            self.push_join(join);
        }

        let _ = write!(
            self.sql,
            " ORDER BY \"{}\" {}",
            SORT_COLUMN,
            self.sort_direction()
        );
        for order in self.query.order_by.iter().skip(1) {
            let _ = write!(self.sql, ", {} {}", order.column, order.direction.to_sql());
        }
        for key in layout.child_keys() {
            let _ = write!(self.sql, ", {} ASC", key.source);
        }

        self.finish()
    }

    /// Render the count statement: same joins and predicate, no paging.
    pub fn count(mut self) -> SqlStatement {
        let pk = format!("{}.\"{}\"", ROOT_ALIAS, self.query.primary_key);
        if self.query.has_joins() {
            let _ = write!(self.sql, "SELECT COUNT(DISTINCT {})", pk);
        } else {
            self.sql.push_str("SELECT COUNT(*)");
        }
        self.push_from();
        self.push_where();
        self.finish()
    }

    fn sort_direction(&self) -> &'static str {
        self.query
            .order_by
            .first()
            .map(|o| o.direction.to_sql())
            .unwrap_or("ASC")
    }

    fn finish(self) -> SqlStatement {
        SqlStatement {
            sql: self.sql,
            binds: self.binds,
        }
    }

    fn inner_select(&mut self) {
        let pk = format!("{}.\"{}\"", ROOT_ALIAS, self.query.primary_key);
        let (sort, direction) = self
            .query
            .order_by
            .first()
            .map(|o| (o.column.to_string(), o.direction))
            .unwrap_or_else(|| (pk.clone(), SortDirection::Asc));

        // Grouped rows take the sort value that orders them first.
        let grouped = self.query.has_joins();
        let sort = match (grouped, direction) {
            (false, _) => sort,
            (true, SortDirection::Asc) => format!("MIN({})", sort),
            (true, SortDirection::Desc) => format!("MAX({})", sort),
        };
        let _ = write!(
            self.sql,
            "SELECT {}.*, {} AS \"{}\"",
            ROOT_ALIAS, sort, SORT_COLUMN
        );
        self.push_from();
        self.push_where();
        if grouped {
            let _ = write!(self.sql, " GROUP BY {}", pk);
        }

        let _ = write!(
            self.sql,
            " ORDER BY \"{}\" {}",
            SORT_COLUMN,
            direction.to_sql()
        );
        for order in self.query.order_by.iter().skip(1) {
            let _ = write!(self.sql, ", {} {}", order.column, order.direction.to_sql());
        }

        if let Paging::Offset { size, offset, .. } = self.query.paging {
            let limit = self.bind(SqlValue::Int(i64::from(size)));
            let offset = self.bind(SqlValue::Int(i64::try_from(offset).unwrap_or(i64::MAX)));
            let _ = write!(self.sql, " LIMIT {} OFFSET {}", limit, offset);
        }
    }

    fn push_from(&mut self) {
        let query = self.query;
        let _ = write!(self.sql, " FROM \"{}\" {}", query.table, ROOT_ALIAS);
        for join in &query.joins {
            self.push_join(join);
        }
    }

    fn push_join(&mut self, join: &Join) {
        let _ = write!(
            self.sql,
            " LEFT JOIN \"{}\" {} ON {}.\"{}\" = {}.\"{}\"",
            join.table,
            join.alias,
            join.alias,
            join.target_column,
            join.parent_alias,
            join.source_column
        );
    }

    fn push_where(&mut self) {
        let query = self.query;
        if let Some(predicate) = &query.predicate {
            let condition = self.predicate(predicate);
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&condition);
        }
    }

    /// Push a bind value and return its placeholder
    fn bind(&mut self, value: SqlValue) -> String {
        self.binds.push(value);
        format!("?{}", self.binds.len())
    }

    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::And(children) => self.group(children, " AND "),
            Predicate::Or(children) => self.group(children, " OR "),
            Predicate::Compare { column, op, value } => {
                let param = self.bind(value.clone());
                format!("{} {} {}", column, op.as_sql(), param)
            }
            Predicate::EqualsIgnoreCase { column, value } => {
                let param = self.bind(SqlValue::String(value.clone()));
                format!("LOWER({}) = LOWER({})", column, param)
            }
            Predicate::Like {
                column,
                pattern,
                case_insensitive,
            } => {
                let param = self.bind(SqlValue::String(pattern.clone()));
                if *case_insensitive {
                    format!("LOWER({}) LIKE LOWER({}) ESCAPE '\\'", column, param)
                } else {
                    format!("{} LIKE {} ESCAPE '\\'", column, param)
                }
            }
            Predicate::Between { column, low, high } => {
                let low = self.bind(low.clone());
                let high = self.bind(high.clone());
                format!("{} BETWEEN {} AND {}", column, low, high)
            }
            Predicate::In { column, values } => {
                let params = self.bind_list(values);
                format!("{} IN ({})", column, params)
            }
            Predicate::ArrayOverlap { column, values } => {
                let params: Vec<String> = values.iter().map(|v| self.bind(v.clone())).collect();
                json_array_overlaps_sql(&column.to_string(), &params)
            }
            Predicate::IsNull(column) => format!("{} IS NULL", column),
            Predicate::IsNotNull(column) => format!("{} IS NOT NULL", column),
        }
    }

    fn group(&mut self, children: &[Predicate], separator: &str) -> String {
        let parts: Vec<String> = children.iter().map(|c| self.predicate(c)).collect();
        format!("({})", parts.join(separator))
    }

    fn bind_list(&mut self, values: &[SqlValue]) -> String {
        values
            .iter()
            .map(|v| self.bind(v.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
