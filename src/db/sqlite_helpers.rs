//! SQLite helper utilities for type conversion
//!
//! SQLite doesn't natively support arrays, UUIDs or timestamps. Arrays are
//! stored as JSON text, UUIDs as hyphenated text and timestamps as RFC 3339
//! UTC text. This module converts between those storage forms and mapped
//! [`Value`]s.

use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::mapper::RowLayout;
use crate::record::Value;
use crate::schema::FieldType;

// ============================================================================
// Array/Vec Helpers (stored as JSON strings in SQLite)
// ============================================================================

/// Serialize a Vec to a JSON string for SQLite storage
#[inline]
pub fn vec_to_json<T: Serialize>(v: &[T]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

/// Deserialize a JSON string from SQLite to a Vec
#[inline]
pub fn json_to_vec<T: DeserializeOwned>(s: &str) -> Result<Vec<T>, sqlx::Error> {
    serde_json::from_str(s).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

// ============================================================================
// Query Building Helpers
// ============================================================================

/// Build a SQL fragment to check if any value from a list exists in a JSON array column
pub fn json_array_overlaps_sql(column: &str, placeholders: &[String]) -> String {
    if placeholders.is_empty() {
        return "1=0".to_string(); // Always false for empty list
    }

    format!(
        "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value IN ({}))",
        column,
        placeholders.join(", ")
    )
}

// ============================================================================
// Row decoding
// ============================================================================

/// Decode column `index` of `row` according to its semantic type
pub fn decode_column(
    row: &SqliteRow,
    index: usize,
    field_type: FieldType,
) -> Result<Value, sqlx::Error> {
    let value = match field_type {
        FieldType::Text | FieldType::Timestamp | FieldType::Uuid => {
            row.try_get::<Option<String>, _>(index)?.map(Value::Text)
        }
        FieldType::Integer => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        FieldType::Real => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        FieldType::Boolean => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        FieldType::TextArray => match row.try_get::<Option<String>, _>(index)? {
            Some(json) => Some(Value::List(
                json_to_vec::<String>(&json)?.into_iter().map(Value::Text).collect(),
            )),
            None => None,
        },
        FieldType::IntegerArray => match row.try_get::<Option<String>, _>(index)? {
            Some(json) => Some(Value::List(
                json_to_vec::<i64>(&json)?.into_iter().map(Value::Int).collect(),
            )),
            None => None,
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decode every column of `row` in layout order
pub fn decode_row(row: &SqliteRow, layout: &RowLayout) -> Result<Vec<Value>, sqlx::Error> {
    layout
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| decode_column(row, index, column.field_type))
        .collect()
}
