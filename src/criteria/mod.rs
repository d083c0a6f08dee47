//! Filter criteria model
//!
//! A [`FilterCriteria`] is a node in a boolean expression tree:
//! - `Leaf`: a single comparison `{field, operator, values}`
//! - `Group`: AND/OR over an ordered, non-empty list of children
//!
//! Construction validates operator/value arity and group shape only. Field
//! existence and value types are checked later, when the tree is compiled
//! against a registered entity.
//!
//! ```rust,ignore
//! let criteria = FilterCriteria::or(vec![
//!     FilterCriteria::eq("status", "COMPLETED"),
//!     FilterCriteria::gt("amount", 1000),
//! ])?;
//! ```

mod operator;
mod value;

pub use operator::{Arity, Operator};
pub use value::FilterValue;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// How the children of a group are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[serde(alias = "and", alias = "And")]
    And,
    #[serde(alias = "or", alias = "Or")]
    Or,
}

impl LogicalOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    operator: Operator,
    values: Vec<FilterValue>,
}

impl Condition {
    /// Dotted logical path (e.g. `orderItems.productCode`)
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &[FilterValue] {
        &self.values
    }
}

/// An AND/OR combination of child criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    logical_operator: LogicalOperator,
    children: Vec<FilterCriteria>,
}

impl Group {
    pub fn logical_operator(&self) -> LogicalOperator {
        self.logical_operator
    }

    pub fn children(&self) -> &[FilterCriteria] {
        &self.children
    }
}

/// A node of the filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCriteria {
    Leaf(Condition),
    Group(Group),
}

impl FilterCriteria {
    // ========================================================================
    // Generic constructors
    // ========================================================================

    /// Build a leaf, validating that `values` matches the operator's arity.
    pub fn leaf(
        field: impl Into<String>,
        operator: Operator,
        values: Vec<FilterValue>,
    ) -> Result<Self> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(QueryError::MalformedCriteria(
                "field path must not be empty".to_string(),
            ));
        }
        if field.split('.').any(|segment| segment.is_empty()) {
            return Err(QueryError::MalformedCriteria(format!(
                "field path '{}' has an empty segment",
                field
            )));
        }
        let arity = operator.arity();
        if !arity.accepts(values.len()) {
            return Err(QueryError::MalformedCriteria(format!(
                "operator '{}' on '{}' requires {}, got {}",
                operator,
                field,
                arity,
                values.len()
            )));
        }
        Ok(FilterCriteria::Leaf(Condition {
            field,
            operator,
            values,
        }))
    }

    /// Build a group. Groups must have at least one child.
    pub fn group(logical_operator: LogicalOperator, children: Vec<FilterCriteria>) -> Result<Self> {
        if children.is_empty() {
            return Err(QueryError::MalformedCriteria(format!(
                "{} group requires at least one child",
                logical_operator.as_str()
            )));
        }
        Ok(FilterCriteria::Group(Group {
            logical_operator,
            children,
        }))
    }

    fn single(field: impl Into<String>, operator: Operator, value: FilterValue) -> Self {
        FilterCriteria::Leaf(Condition {
            field: field.into(),
            operator,
            values: vec![value],
        })
    }

    // ========================================================================
    // Helper constructors for programmatic use
    // ========================================================================

    /// Create an equals filter
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Eq, value.into())
    }

    /// Create a not-equals filter
    pub fn neq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Neq, value.into())
    }

    /// Create a case-insensitive equals filter.
    ///
    /// Case folding is SQLite's `LOWER`, which only folds ASCII letters:
    /// `"Ärger"` matches `"ÄRGER"` but `"ärger"` does not.
    pub fn eqic(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Eqic, value.into())
    }

    /// Create a contains filter, case-insensitive for ASCII letters only
    /// (see [`FilterCriteria::eqic`])
    pub fn like(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Like, value.into())
    }

    /// Create a greater-than filter
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Gt, value.into())
    }

    /// Create a less-than filter
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Lt, value.into())
    }

    /// Create a greater-than-or-equal filter
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Gte, value.into())
    }

    /// Create a less-than-or-equal filter
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::single(field, Operator::Lte, value.into())
    }

    /// Create a between filter (inclusive)
    pub fn between(
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        FilterCriteria::Leaf(Condition {
            field: field.into(),
            operator: Operator::Between,
            values: vec![low.into(), high.into()],
        })
    }

    /// Create an in-list filter
    pub fn in_list<V: Into<FilterValue>>(field: impl Into<String>, values: Vec<V>) -> Result<Self> {
        Self::leaf(
            field,
            Operator::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Create an array-overlap filter
    pub fn ao<V: Into<FilterValue>>(field: impl Into<String>, values: Vec<V>) -> Result<Self> {
        Self::leaf(
            field,
            Operator::Ao,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Create an is-null filter
    pub fn is_null(field: impl Into<String>) -> Self {
        FilterCriteria::Leaf(Condition {
            field: field.into(),
            operator: Operator::IsNull,
            values: Vec::new(),
        })
    }

    /// Create an is-not-null filter
    pub fn is_not_null(field: impl Into<String>) -> Self {
        FilterCriteria::Leaf(Condition {
            field: field.into(),
            operator: Operator::IsNotNull,
            values: Vec::new(),
        })
    }

    /// AND the given children together
    pub fn and(children: Vec<FilterCriteria>) -> Result<Self> {
        Self::group(LogicalOperator::And, children)
    }

    /// OR the given children together
    pub fn or(children: Vec<FilterCriteria>) -> Result<Self> {
        Self::group(LogicalOperator::Or, children)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Nesting depth of the tree (a single leaf has depth 1)
    pub fn depth(&self) -> usize {
        match self {
            FilterCriteria::Leaf(_) => 1,
            FilterCriteria::Group(group) => {
                1 + group
                    .children
                    .iter()
                    .map(FilterCriteria::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    /// Every field path referenced by a leaf, in depth-first order
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterCriteria::Leaf(condition) => out.push(condition.field.as_str()),
            FilterCriteria::Group(group) => {
                for child in &group.children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_between_requires_two_bounds() {
        let err = FilterCriteria::leaf("amount", Operator::Between, vec![100.into()]);
        assert_matches!(err, Err(QueryError::MalformedCriteria(_)));

        let ok = FilterCriteria::leaf("amount", Operator::Between, vec![100.into(), 200.into()]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_null_checks_take_no_values() {
        assert_matches!(
            FilterCriteria::leaf("deletedAt", Operator::IsNull, vec!["x".into()]),
            Err(QueryError::MalformedCriteria(_))
        );
        assert_matches!(
            FilterCriteria::leaf("deletedAt", Operator::IsNotNull, vec!["x".into()]),
            Err(QueryError::MalformedCriteria(_))
        );
        assert!(FilterCriteria::leaf("deletedAt", Operator::IsNull, vec![]).is_ok());
    }

    #[test]
    fn test_set_operators_require_values() {
        assert_matches!(
            FilterCriteria::in_list::<&str>("status", vec![]),
            Err(QueryError::MalformedCriteria(_))
        );
        assert_matches!(
            FilterCriteria::ao::<&str>("tags", vec![]),
            Err(QueryError::MalformedCriteria(_))
        );
        assert!(FilterCriteria::in_list("status", vec!["A", "B"]).is_ok());
    }

    #[test]
    fn test_empty_group_rejected() {
        assert_matches!(
            FilterCriteria::and(vec![]),
            Err(QueryError::MalformedCriteria(_))
        );
        assert_matches!(
            FilterCriteria::or(vec![]),
            Err(QueryError::MalformedCriteria(_))
        );
    }

    #[test]
    fn test_empty_path_segments_rejected() {
        assert!(FilterCriteria::leaf("", Operator::Eq, vec![1.into()]).is_err());
        assert!(FilterCriteria::leaf("orderItems..code", Operator::Eq, vec![1.into()]).is_err());
    }

    #[test]
    fn test_depth_and_fields() {
        let tree = FilterCriteria::and(vec![
            FilterCriteria::eq("status", "A"),
            FilterCriteria::or(vec![
                FilterCriteria::gt("amount", 10),
                FilterCriteria::is_null("orderItems.productCode"),
            ])
            .unwrap(),
        ])
        .unwrap();

        assert_eq!(tree.depth(), 3);
        assert_eq!(
            tree.fields(),
            vec!["status", "amount", "orderItems.productCode"]
        );
    }
}
