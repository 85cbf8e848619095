//! Text argument binding
//!
//! Command arguments arrive as text. Once the server has prepared a statement it
//! reports the type it inferred for every `$n`; each argument is parsed into the
//! matching Rust type so that `WHERE id = $1` works with `"1"` against an integer key.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use uuid::Uuid;

use crate::error::{ClientError, Result};

pub(crate) type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Parse `value` into a parameter accepted by `ty`
pub(crate) fn bind_text(value: &str, ty: &Type) -> Result<BoxedParam> {
    // Covers text, varchar, char, name, unknown and text-like extension types (citext)
    if <String as ToSql>::accepts(ty) {
        return Ok(Box::new(value.to_string()));
    }

    let trimmed = value.trim();
    let param: BoxedParam = match *ty {
        Type::BOOL => Box::new(parse_bool(trimmed).ok_or_else(|| mismatch(value, ty))?),
        Type::INT2 => Box::new(trimmed.parse::<i16>().map_err(|_| mismatch(value, ty))?),
        Type::INT4 => Box::new(trimmed.parse::<i32>().map_err(|_| mismatch(value, ty))?),
        Type::INT8 => Box::new(trimmed.parse::<i64>().map_err(|_| mismatch(value, ty))?),
        Type::OID => Box::new(trimmed.parse::<u32>().map_err(|_| mismatch(value, ty))?),
        Type::FLOAT4 => Box::new(trimmed.parse::<f32>().map_err(|_| mismatch(value, ty))?),
        Type::FLOAT8 => Box::new(trimmed.parse::<f64>().map_err(|_| mismatch(value, ty))?),
        Type::NUMERIC => Box::new(parse_decimal(trimmed).ok_or_else(|| mismatch(value, ty))?),
        Type::UUID => Box::new(Uuid::parse_str(trimmed).map_err(|_| mismatch(value, ty))?),
        Type::DATE => Box::new(
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| mismatch(value, ty))?,
        ),
        Type::TIME => Box::new(
            NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f").map_err(|_| mismatch(value, ty))?,
        ),
        Type::TIMESTAMP => Box::new(parse_timestamp(trimmed).ok_or_else(|| mismatch(value, ty))?),
        Type::TIMESTAMPTZ => Box::new(
            DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| mismatch(value, ty))?,
        ),
        Type::JSON | Type::JSONB => Box::new(
            serde_json::from_str::<serde_json::Value>(value).map_err(|_| mismatch(value, ty))?,
        ),
        _ => {
            return Err(ClientError::invalid_input(format!(
                "Cannot bind a text value to a parameter of type '{}'",
                ty.name()
            )))
        }
    };

    Ok(param)
}

/// Borrow boxed parameters in the shape the driver expects
pub(crate) fn as_refs(params: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|param| &**param as &(dyn ToSql + Sync)).collect()
}

/// Boolean spellings the server itself accepts
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value).or_else(|_| Decimal::from_scientific(value)).ok()
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn mismatch(value: &str, ty: &Type) -> ClientError {
    ClientError::invalid_input(format!("Value '{value}' is not a valid {}", ty.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_types_take_value_verbatim() {
        for ty in [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN] {
            assert!(bind_text("  keep spaces ", &ty).is_ok());
        }
        assert!(bind_text("", &Type::TEXT).is_ok());
    }

    #[test]
    fn test_integer_parameters() {
        assert!(bind_text("1", &Type::INT4).is_ok());
        assert!(bind_text(" 42 ", &Type::INT8).is_ok());
        assert!(bind_text("-7", &Type::INT2).is_ok());

        let err = bind_text("one", &Type::INT4).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(err.message().contains("'one' is not a valid int4"));

        assert!(bind_text("70000", &Type::INT2).is_err());
    }

    #[test]
    fn test_float_and_bool_parameters() {
        assert!(bind_text("3.25", &Type::FLOAT8).is_ok());
        assert!(bind_text("1e3", &Type::FLOAT4).is_ok());
        assert!(bind_text("abc", &Type::FLOAT8).is_err());

        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert!(bind_text("t", &Type::BOOL).is_ok());
        assert!(bind_text("maybe", &Type::BOOL).is_err());
    }

    #[test]
    fn test_temporal_parameters() {
        assert!(bind_text("2024-02-29", &Type::DATE).is_ok());
        assert!(bind_text("2023-02-29", &Type::DATE).is_err());
        assert!(bind_text("12:30:00", &Type::TIME).is_ok());
        assert!(bind_text("2024-01-01 08:00:00", &Type::TIMESTAMP).is_ok());
        assert!(bind_text("2024-01-01T08:00:00.5", &Type::TIMESTAMP).is_ok());
        assert!(bind_text("2024-01-01T08:00:00+02:00", &Type::TIMESTAMPTZ).is_ok());
        assert!(bind_text("yesterday", &Type::TIMESTAMPTZ).is_err());
    }

    #[test]
    fn test_uuid_and_json_parameters() {
        assert!(bind_text("67e55044-10b1-426f-9247-bb680e5fe0c8", &Type::UUID).is_ok());
        assert!(bind_text("not-a-uuid", &Type::UUID).is_err());
        assert!(bind_text(r#"{"a": [1, 2]}"#, &Type::JSONB).is_ok());
        assert!(bind_text("{broken", &Type::JSON).is_err());
    }

    #[test]
    fn test_numeric_parameters() {
        assert!(bind_text("2.50", &Type::NUMERIC).is_ok());
        assert!(bind_text("-0.001", &Type::NUMERIC).is_ok());
        assert!(bind_text("1e3", &Type::NUMERIC).is_ok());
        assert_eq!(parse_decimal("2.50").map(|d| d.to_string()), Some("2.50".to_string()));

        let err = bind_text("two fifty", &Type::NUMERIC).unwrap_err();
        assert!(err.message().contains("not a valid numeric"));
    }

    #[test]
    fn test_unsupported_type_is_reported() {
        let err = bind_text("1 day", &Type::INTERVAL).unwrap_err();
        assert!(err.message().contains("type 'interval'"));
    }

    #[test]
    fn test_as_refs_keeps_order_and_length() {
        let params = vec![
            bind_text("New data", &Type::TEXT).unwrap(),
            bind_text("1", &Type::INT4).unwrap(),
        ];
        assert_eq!(as_refs(&params).len(), 2);
    }
}
