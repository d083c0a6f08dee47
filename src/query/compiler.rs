//! Query compiler
//!
//! Turns a caller's [`SearchParams`] (plus an optional injected predicate)
//! into an immutable [`CompiledQuery`]:
//!
//! 1. walk the criteria tree depth-first, resolving every leaf and coercing
//!    its values to the column type
//! 2. collect the joins every leaf and the sort field need, deduplicated by
//!    relation path and aliased in first-use order
//! 3. AND the injected predicate with the caller's tree at the root
//! 4. attach the sort (always ending in the primary key) and the paging window

use tracing::debug;

use crate::config::EngineConfig;
use crate::criteria::{Condition, FilterCriteria, FilterValue, LogicalOperator, Operator};
use crate::error::{QueryError, Result};
use crate::schema::{FieldType, ResolvedField, SchemaRegistry};

use super::coerce::coerce;
use super::params::{SearchParams, SortDirection};
use super::plan::{
    ColumnRef, CompareOp, CompiledQuery, Join, OrderBy, Paging, Predicate, ROOT_ALIAS, SqlValue,
};

// ============================================================================
// Join planning
// ============================================================================

/// Assigns one alias per relation path, in the order paths are first used.
#[derive(Debug, Default)]
struct JoinPlanner {
    joins: Vec<Join>,
}

impl JoinPlanner {
    fn alias_of(&self, path: &str) -> Option<&str> {
        self.joins
            .iter()
            .find(|j| j.path == path)
            .map(|j| j.alias.as_str())
    }

    /// Ensure every hop of `field` is joined and return the column reference
    fn column_for(&mut self, field: &ResolvedField) -> ColumnRef {
        let mut alias = ROOT_ALIAS.to_string();
        for hop in &field.hops {
            if let Some(existing) = self.alias_of(&hop.path) {
                alias = existing.to_string();
                continue;
            }
            let next = format!("t{}", self.joins.len() + 1);
            self.joins.push(Join {
                path: hop.path.clone(),
                alias: next.clone(),
                parent_alias: alias,
                kind: hop.kind,
                table: hop.table.clone(),
                source_column: hop.source_column.clone(),
                target_column: hop.target_column.clone(),
            });
            alias = next;
        }
        ColumnRef::new(alias, field.column.clone())
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Compiles search parameters against a frozen registry.
///
/// Compilation is pure: the same inputs always produce equal plans.
pub struct QueryCompiler<'a> {
    registry: &'a SchemaRegistry,
    config: &'a EngineConfig,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Compile `params` for `entity`, gating the result with `injected` when given.
    pub fn compile(
        &self,
        entity: &str,
        params: &SearchParams,
        injected: Option<&FilterCriteria>,
    ) -> Result<CompiledQuery> {
        let schema = self.registry.entity(entity)?;
        let mut planner = JoinPlanner::default();

        let injected = injected
            .map(|criteria| self.compile_tree(entity, criteria, &mut planner))
            .transpose()?;
        let user = params
            .criteria
            .as_ref()
            .map(|criteria| self.compile_tree(entity, criteria, &mut planner))
            .transpose()?;

        // The injected predicate gates the whole result set, so it is never
        // merged into the caller's groups.
        let predicate = match (injected, user) {
            (Some(gate), Some(user)) => Some(Predicate::And(vec![gate, user])),
            (gate, user) => gate.or(user),
        };

        let order_by = self.compile_sort(entity, params, &mut planner)?;
        let paging = self.compile_paging(params)?;

        let query = CompiledQuery {
            entity: entity.to_string(),
            table: schema.table().to_string(),
            primary_key: self.registry.primary_key(entity)?.column.clone(),
            joins: planner.joins,
            predicate,
            order_by,
            paging,
        };

        debug!(
            entity = %query.entity,
            joins = query.joins.len(),
            binds = query.predicate.as_ref().map_or(0, Predicate::bind_count),
            unpaged = query.is_unpaged(),
            "Compiled query"
        );
        Ok(query)
    }

    fn compile_tree(
        &self,
        entity: &str,
        criteria: &FilterCriteria,
        planner: &mut JoinPlanner,
    ) -> Result<Predicate> {
        let depth = criteria.depth();
        if depth > self.config.max_criteria_depth {
            return Err(QueryError::InvalidFilterCriteria(format!(
                "criteria nesting depth {} exceeds the maximum of {}",
                depth, self.config.max_criteria_depth
            )));
        }
        self.compile_node(entity, criteria, planner)
    }

    fn compile_node(
        &self,
        entity: &str,
        criteria: &FilterCriteria,
        planner: &mut JoinPlanner,
    ) -> Result<Predicate> {
        match criteria {
            FilterCriteria::Leaf(condition) => self.compile_leaf(entity, condition, planner),
            FilterCriteria::Group(group) => {
                if group.children().is_empty() {
                    return Err(QueryError::InvalidFilterCriteria(format!(
                        "empty {} group",
                        group.logical_operator().as_str()
                    )));
                }
                let children = group
                    .children()
                    .iter()
                    .map(|child| self.compile_node(entity, child, planner))
                    .collect::<Result<Vec<_>>>()?;
                Ok(match group.logical_operator() {
                    LogicalOperator::And => Predicate::And(children),
                    LogicalOperator::Or => Predicate::Or(children),
                })
            }
        }
    }

    fn compile_leaf(
        &self,
        entity: &str,
        condition: &Condition,
        planner: &mut JoinPlanner,
    ) -> Result<Predicate> {
        let field = self.registry.resolve(entity, condition.field())?;
        let operator = condition.operator();
        check_operator(&field, operator)?;

        let path = field.path.as_str();
        let field_type = field.field_type;
        let values = condition.values();
        let column = planner.column_for(&field);

        let compare = |op: CompareOp, value: &FilterValue| -> Result<Predicate> {
            Ok(Predicate::Compare {
                column: column.clone(),
                op,
                value: coerce(path, field_type, value)?,
            })
        };

        match (operator, values) {
            (Operator::Eq, [value]) => compare(CompareOp::Eq, value),
            (Operator::Neq, [value]) => compare(CompareOp::Ne, value),
            (Operator::Gt, [value]) => compare(CompareOp::Gt, value),
            (Operator::Lt, [value]) => compare(CompareOp::Lt, value),
            (Operator::Gte, [value]) => compare(CompareOp::Gte, value),
            (Operator::Lte, [value]) => compare(CompareOp::Lte, value),
            (Operator::Eqic, [value]) => match coerce(path, field_type, value)? {
                SqlValue::String(s) => Ok(Predicate::EqualsIgnoreCase { column, value: s }),
                _ => Err(QueryError::type_conversion(path, field_type, value)),
            },
            (Operator::Like, [value]) => Ok(Predicate::Like {
                column,
                pattern: format!("%{}%", escape_like(&like_text(path, field_type, value)?)),
                case_insensitive: true,
            }),
            (Operator::Between, [low, high]) => Ok(Predicate::Between {
                column,
                low: coerce(path, field_type, low)?,
                high: coerce(path, field_type, high)?,
            }),
            (Operator::In, values) if !values.is_empty() => Ok(Predicate::In {
                column,
                values: coerce_all(path, field_type, values)?,
            }),
            (Operator::Ao, values) if !values.is_empty() => Ok(Predicate::ArrayOverlap {
                column,
                values: coerce_all(path, field_type, values)?,
            }),
            (Operator::IsNull, []) => Ok(Predicate::IsNull(column)),
            (Operator::IsNotNull, []) => Ok(Predicate::IsNotNull(column)),
            // Leaves built through FilterCriteria::leaf never get here.
            (operator, values) => Err(QueryError::InvalidFilterCriteria(format!(
                "operator '{}' on '{}' requires {}, got {}",
                operator,
                path,
                operator.arity(),
                values.len()
            ))),
        }
    }

    fn compile_sort(
        &self,
        entity: &str,
        params: &SearchParams,
        planner: &mut JoinPlanner,
    ) -> Result<Vec<OrderBy>> {
        let primary_key = self.registry.primary_key(entity)?;
        let tiebreaker = OrderBy {
            column: ColumnRef::root(primary_key.column.clone()),
            direction: SortDirection::Asc,
        };

        let Some(sort_field) = params.sort_field.as_deref() else {
            return Ok(vec![tiebreaker]);
        };

        let field = self.registry.resolve(entity, sort_field)?;
        if field.crosses_collection() {
            return Err(QueryError::InvalidFilterCriteria(format!(
                "cannot sort by '{}': it crosses a nested collection",
                sort_field
            )));
        }
        if field.field_type.is_array() {
            return Err(QueryError::InvalidFilterCriteria(format!(
                "cannot sort by array field '{}'",
                sort_field
            )));
        }

        let sort = OrderBy {
            column: planner.column_for(&field),
            direction: params.sort_direction,
        };
        if sort.column == tiebreaker.column {
            Ok(vec![sort])
        } else {
            Ok(vec![sort, tiebreaker])
        }
    }

    fn compile_paging(&self, params: &SearchParams) -> Result<Paging> {
        if params.unpaged {
            return Ok(Paging::Unpaged);
        }
        if params.size == 0 || params.size > self.config.max_page_size {
            return Err(QueryError::InvalidFilterCriteria(format!(
                "page size must be between 1 and {}, got {}",
                self.config.max_page_size, params.size
            )));
        }
        Ok(Paging::Offset {
            page: params.page,
            size: params.size,
            offset: params.offset(),
        })
    }
}

/// Reject operators that make no sense for the column type.
fn check_operator(field: &ResolvedField, operator: Operator) -> Result<()> {
    let field_type = field.field_type;
    let allowed = match operator {
        Operator::IsNull | Operator::IsNotNull => true,
        Operator::Ao => field_type.is_array(),
        _ if field_type.is_array() => false,
        Operator::Eqic | Operator::Like => field_type.is_textual(),
        Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte | Operator::Between => {
            field_type.is_orderable()
        }
        Operator::Eq | Operator::Neq | Operator::In => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(QueryError::InvalidFilterCriteria(format!(
            "operator '{}' is not supported for {} field '{}'",
            operator, field_type, field.path
        )))
    }
}

fn coerce_all(path: &str, field_type: FieldType, values: &[FilterValue]) -> Result<Vec<SqlValue>> {
    values
        .iter()
        .map(|value| coerce(path, field_type, value))
        .collect()
}

/// `like` matches substrings, so the value is taken as raw text rather than
/// coerced to the column type.
fn like_text(path: &str, field_type: FieldType, value: &FilterValue) -> Result<String> {
    match value {
        FilterValue::String(s) => Ok(s.clone()),
        FilterValue::Int(i) => Ok(i.to_string()),
        FilterValue::Float(f) => Ok(f.to_string()),
        FilterValue::Bool(_) => Err(QueryError::type_conversion(path, field_type, value)),
    }
}

/// Escape LIKE wildcards so user input only ever matches literally
pub(crate) fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
