//! Coercion of caller values to column types.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::criteria::FilterValue;
use crate::error::{QueryError, Result};
use crate::schema::FieldType;

use super::plan::SqlValue;

/// Canonical storage form of timestamps: RFC 3339, UTC, whole seconds
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Coerce `value` to the storage representation of `field_type`.
///
/// Array types coerce to their element type; the caller handles the set.
pub fn coerce(path: &str, field_type: FieldType, value: &FilterValue) -> Result<SqlValue> {
    let mismatch = || QueryError::type_conversion(path, field_type, value);

    match field_type.element_type().unwrap_or(field_type) {
        FieldType::Text => match value {
            FilterValue::String(s) => Ok(SqlValue::String(s.clone())),
            FilterValue::Int(i) => Ok(SqlValue::String(i.to_string())),
            FilterValue::Float(f) => Ok(SqlValue::String(f.to_string())),
            FilterValue::Bool(_) => Err(mismatch()),
        },
        FieldType::Integer => match value {
            FilterValue::Int(i) => Ok(SqlValue::Int(*i)),
            FilterValue::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(SqlValue::Int(*f as i64))
            }
            FilterValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        FieldType::Real => match value {
            FilterValue::Int(i) => Ok(SqlValue::Float(*i as f64)),
            FilterValue::Float(f) if f.is_finite() => Ok(SqlValue::Float(*f)),
            FilterValue::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(SqlValue::Float(f)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        FieldType::Boolean => match value {
            FilterValue::Bool(b) => Ok(SqlValue::Bool(*b)),
            FilterValue::Int(0) => Ok(SqlValue::Bool(false)),
            FilterValue::Int(1) => Ok(SqlValue::Bool(true)),
            FilterValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(SqlValue::Bool(true)),
                "false" | "0" => Ok(SqlValue::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        FieldType::Timestamp => match value {
            FilterValue::String(s) => parse_timestamp(s.trim())
                .map(|ts| SqlValue::String(format_timestamp(ts)))
                .ok_or_else(mismatch),
            FilterValue::Int(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|ts| SqlValue::String(format_timestamp(ts)))
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        FieldType::Uuid => match value {
            FilterValue::String(s) => Uuid::parse_str(s.trim())
                .map(|u| SqlValue::String(u.hyphenated().to_string()))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        // element_type() never yields an array type
        FieldType::TextArray | FieldType::IntegerArray => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(
            coerce("amount", FieldType::Real, &FilterValue::Int(1000)).unwrap(),
            SqlValue::Float(1000.0)
        );
        assert_eq!(
            coerce("qty", FieldType::Integer, &"42".into()).unwrap(),
            SqlValue::Int(42)
        );
        assert_eq!(
            coerce("qty", FieldType::Integer, &FilterValue::Float(3.0)).unwrap(),
            SqlValue::Int(3)
        );
        assert_matches!(
            coerce("qty", FieldType::Integer, &FilterValue::Float(3.5)),
            Err(QueryError::TypeConversion { .. })
        );
        assert_matches!(
            coerce("amount", FieldType::Real, &"lots".into()),
            Err(QueryError::TypeConversion { .. })
        );
    }

    #[test]
    fn test_boolean_and_text_coercion() {
        assert_eq!(
            coerce("flagged", FieldType::Boolean, &"TRUE".into()).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            coerce("flagged", FieldType::Boolean, &FilterValue::Int(0)).unwrap(),
            SqlValue::Bool(false)
        );
        assert_matches!(
            coerce("status", FieldType::Text, &FilterValue::Bool(true)),
            Err(QueryError::TypeConversion { .. })
        );
        assert_eq!(
            coerce("code", FieldType::Text, &FilterValue::Int(7)).unwrap(),
            SqlValue::String("7".into())
        );
    }

    #[test]
    fn test_timestamp_and_uuid_normalization() {
        assert_eq!(
            coerce("createdAt", FieldType::Timestamp, &"2024-03-01T12:00:00+02:00".into()).unwrap(),
            SqlValue::String("2024-03-01T10:00:00Z".into())
        );
        assert_eq!(
            coerce("createdAt", FieldType::Timestamp, &"2024-03-01".into()).unwrap(),
            SqlValue::String("2024-03-01T00:00:00Z".into())
        );
        assert_matches!(
            coerce("createdAt", FieldType::Timestamp, &"yesterday".into()),
            Err(QueryError::TypeConversion { .. })
        );
        assert_eq!(
            coerce(
                "externalRef",
                FieldType::Uuid,
                &"67E55044-10B1-426F-9247-BB680E5FE0C8".into()
            )
            .unwrap(),
            SqlValue::String("67e55044-10b1-426f-9247-bb680e5fe0c8".into())
        );
    }

    #[test]
    fn test_array_columns_coerce_elements() {
        assert_eq!(
            coerce("priorities", FieldType::IntegerArray, &"5".into()).unwrap(),
            SqlValue::Int(5)
        );
        assert_eq!(
            coerce("tags", FieldType::TextArray, &"urgent".into()).unwrap(),
            SqlValue::String("urgent".into())
        );
    }
}
