//! Column metadata for registered entities.

use std::fmt;

/// Semantic type of a column.
///
/// SQLite has no native array, UUID or timestamp types: arrays are stored as
/// JSON text, UUIDs as hyphenated text and timestamps as RFC 3339 UTC text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Uuid,
    TextArray,
    IntegerArray,
}

impl FieldType {
    pub fn is_array(self) -> bool {
        matches!(self, FieldType::TextArray | FieldType::IntegerArray)
    }

    /// Element type of an array column
    pub fn element_type(self) -> Option<FieldType> {
        match self {
            FieldType::TextArray => Some(FieldType::Text),
            FieldType::IntegerArray => Some(FieldType::Integer),
            _ => None,
        }
    }

    /// Whether `gt`/`lt`/`between` and sorting make sense on this type
    pub fn is_orderable(self) -> bool {
        !matches!(
            self,
            FieldType::Boolean | FieldType::TextArray | FieldType::IntegerArray
        )
    }

    /// Whether string operators (`like`, `eqic`) apply
    pub fn is_textual(self) -> bool {
        matches!(self, FieldType::Text | FieldType::Uuid)
    }

    /// SQLite storage class
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::Integer | FieldType::Boolean => "INTEGER",
            FieldType::Real => "REAL",
            FieldType::Text
            | FieldType::Timestamp
            | FieldType::Uuid
            | FieldType::TextArray
            | FieldType::IntegerArray => "TEXT",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Real => "real",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Uuid => "uuid",
            FieldType::TextArray => "text[]",
            FieldType::IntegerArray => "integer[]",
        };
        f.write_str(name)
    }
}

/// A logical field mapped to a physical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Logical name used in filters and projections
    pub name: String,
    /// Column name in the database
    pub column: String,
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, column: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            field_type,
        }
    }
}
