//! Filter operators and their value arity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Number of values an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No value (`isnull`, `isnotnull`)
    None,
    /// Exactly one value
    One,
    /// Exactly two ordered bounds (`between`)
    Two,
    /// A non-empty set (`in`, `ao`)
    NonEmpty,
}

impl Arity {
    /// Check whether `count` values satisfy this arity
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::None => count == 0,
            Arity::One => count == 1,
            Arity::Two => count == 2,
            Arity::NonEmpty => count > 0,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::None => f.write_str("no values"),
            Arity::One => f.write_str("exactly one value"),
            Arity::Two => f.write_str("exactly two values"),
            Arity::NonEmpty => f.write_str("at least one value"),
        }
    }
}

/// Comparison operator of a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equals
    Eq,
    /// Not equals
    Neq,
    /// Equals, ignoring case
    Eqic,
    /// Contains substring (case-insensitive)
    Like,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// Between two bounds (inclusive)
    Between,
    /// In list
    In,
    /// Array overlap: stored array shares at least one element with the set
    Ao,
    /// Is null
    IsNull,
    /// Is not null
    IsNotNull,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Eqic,
        Operator::Like,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Between,
        Operator::In,
        Operator::Ao,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    pub const fn arity(self) -> Arity {
        match self {
            Operator::IsNull | Operator::IsNotNull => Arity::None,
            Operator::Between => Arity::Two,
            Operator::In | Operator::Ao => Arity::NonEmpty,
            Operator::Eq
            | Operator::Neq
            | Operator::Eqic
            | Operator::Like
            | Operator::Gt
            | Operator::Lt
            | Operator::Gte
            | Operator::Lte => Arity::One,
        }
    }

    /// Wire name (`"eq"`, `"isnotnull"`, ...)
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Eqic => "eqic",
            Operator::Like => "like",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::Ao => "ao",
            Operator::IsNull => "isnull",
            Operator::IsNotNull => "isnotnull",
        }
    }

    /// True for operators that order values (`gt`, `lt`, `gte`, `lte`, `between`)
    pub const fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte | Operator::Between
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == lowered)
            .ok_or_else(|| QueryError::MalformedCriteria(format!("unknown operator '{}'", s)))
    }
}
