//! Row decoding
//!
//! - Types without a native mapping ([`decodes`] is false) are selected as text by the caller
//! - NUMERIC rendered as an exact decimal string
//! - JSON/JSONB preserved as nested JSON
//! - BYTEA data is Base64-encoded
//! - Dates and times rendered as ISO 8601 strings
//! - NaN/Infinity floats become null

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{ClientError, Result};

/// Convert a row to one JSON value per column
pub(crate) fn row_to_json(row: &Row) -> Result<Vec<Value>> {
    (0..row.len()).map(|idx| column_to_json(row, idx)).collect()
}

/// Whether [`row_to_json`] can read columns of type `ty`
pub(crate) fn decodes(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::OID
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::NUMERIC
            | Type::JSON
            | Type::JSONB
            | Type::BYTEA
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::DATE
            | Type::TIME
            | Type::UUID
    ) || <String as FromSql>::accepts(ty)
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, what: &str) -> Result<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| ClientError::query_failed(format!("Failed to get {what} value: {e}")))
}

fn float_to_json(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn column_to_json(row: &Row, idx: usize) -> Result<Value> {
    let col_type = row.columns()[idx].type_();

    let value = match *col_type {
        Type::BOOL => get::<bool>(row, idx, "boolean")?.map(Value::Bool),

        Type::INT2 => get::<i16>(row, idx, "i16")?.map(|v| Value::Number(v.into())),
        Type::INT4 => get::<i32>(row, idx, "i32")?.map(|v| Value::Number(v.into())),
        Type::INT8 => get::<i64>(row, idx, "i64")?.map(|v| Value::Number(v.into())),
        Type::OID => get::<u32>(row, idx, "oid")?.map(|v| Value::Number(v.into())),

        Type::FLOAT4 => get::<f32>(row, idx, "f32")?.map(|v| float_to_json(f64::from(v))),
        Type::FLOAT8 => get::<f64>(row, idx, "f64")?.map(float_to_json),

        // Kept as a string so no precision is lost
        Type::NUMERIC => get::<Decimal>(row, idx, "numeric")?.map(|v| Value::String(v.to_string())),

        Type::JSON | Type::JSONB => get::<Value>(row, idx, "JSON")?,

        Type::BYTEA => get::<Vec<u8>>(row, idx, "bytea")?
            .map(|v| Value::String(base64::engine::general_purpose::STANDARD.encode(v))),

        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx, "timestamp")?
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::TIMESTAMPTZ => {
            get::<DateTime<Utc>>(row, idx, "timestamptz")?.map(|v| Value::String(v.to_rfc3339()))
        }
        Type::DATE => get::<NaiveDate>(row, idx, "date")?
            .map(|v| Value::String(v.format("%Y-%m-%d").to_string())),
        Type::TIME => get::<NaiveTime>(row, idx, "time")?
            .map(|v| Value::String(v.format("%H:%M:%S%.f").to_string())),

        Type::UUID => get::<Uuid>(row, idx, "UUID")?.map(|v| Value::String(v.to_string())),

        // Text types and anything else the driver can hand over as a string
        _ => {
            let text = row.try_get::<_, Option<String>>(idx).map_err(|e| {
                ClientError::query_failed(format!(
                    "Cannot display PostgreSQL type '{}' (cast the column to text): {e}",
                    col_type.name()
                ))
            })?;
            text.map(Value::String)
        }
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Render a decoded value for a status line
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&Value::Null), "NULL");
        assert_eq!(display_value(&json!("New data")), "New data");
        assert_eq!(display_value(&json!("")), "");
        assert_eq!(display_value(&json!(1)), "1");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_decodes() {
        for ty in [Type::INT4, Type::NUMERIC, Type::TEXT, Type::VARCHAR, Type::TIMESTAMPTZ] {
            assert!(decodes(&ty), "{ty} should decode natively");
        }
        for ty in [Type::INTERVAL, Type::INET, Type::MONEY, Type::INT4_ARRAY, Type::TEXT_ARRAY] {
            assert!(!decodes(&ty), "{ty} should fall back to text");
        }
    }

    #[test]
    fn test_float_to_json_handles_non_finite() {
        assert_eq!(float_to_json(1.5), json!(1.5));
        assert_eq!(float_to_json(f64::NAN), Value::Null);
        assert_eq!(float_to_json(f64::INFINITY), Value::Null);
    }
}
