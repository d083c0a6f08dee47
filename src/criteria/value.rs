//! Scalar values carried by filter leaves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// A typed scalar supplied by the caller.
///
/// Values are not checked against any column type here; the compiler
/// coerces them once the target field is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl FilterValue {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterValue::Bool(_) => "boolean",
            FilterValue::Int(_) => "integer",
            FilterValue::Float(_) => "float",
            FilterValue::String(_) => "string",
        }
    }

    /// Convert a JSON scalar into a filter value.
    ///
    /// Arrays, objects and null are not scalars and are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(FilterValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FilterValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(FilterValue::Float(f))
                } else {
                    Err(QueryError::MalformedCriteria(format!(
                        "number out of range: {}",
                        n
                    )))
                }
            }
            serde_json::Value::String(s) => Ok(FilterValue::String(s.clone())),
            other => Err(QueryError::MalformedCriteria(format!(
                "expected a scalar value, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(i) => write!(f, "{}", i),
            FilterValue::Float(v) => write!(f, "{}", v),
            FilterValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(i: i64) -> Self {
        FilterValue::Int(i)
    }
}

impl From<i32> for FilterValue {
    fn from(i: i32) -> Self {
        FilterValue::Int(i as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(f: f64) -> Self {
        FilterValue::Float(f)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}
