//! Convert serde_json::Value to typed values that sqlx can bind, per declared column type.

use crate::config::ColumnType;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value that can be bound to a PostgreSQL query. The declared type travels with the value so
/// NULLs and numbers are sent with the column's own OID.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null(ColumnType),
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
    Timestamp(DateTime<Utc>),
}

impl PgBindValue {
    /// Coerce a JSON value into the column's type. Numeric strings are accepted for numbers,
    /// "true"/"false" for booleans. Returns a short reason on mismatch.
    pub fn for_column(ty: ColumnType, v: &Value) -> Result<Self, String> {
        if v.is_null() {
            return Ok(PgBindValue::Null(ty));
        }
        match ty {
            ColumnType::Text => match v {
                Value::String(s) => Ok(PgBindValue::String(s.clone())),
                Value::Number(n) => Ok(PgBindValue::String(n.to_string())),
                _ => Err("must be a string".into()),
            },
            ColumnType::Int => {
                let n = as_i64(v).ok_or_else(|| "must be an integer".to_string())?;
                i32::try_from(n)
                    .map(PgBindValue::I32)
                    .map_err(|_| "is out of range".to_string())
            }
            ColumnType::BigInt => as_i64(v)
                .map(PgBindValue::I64)
                .ok_or_else(|| "must be an integer".to_string()),
            ColumnType::Double => match v {
                Value::Number(n) => n.as_f64().map(PgBindValue::F64).ok_or_else(|| "must be a number".to_string()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(PgBindValue::F64)
                    .map_err(|_| "must be a number".to_string()),
                _ => Err("must be a number".into()),
            },
            ColumnType::Bool => match v {
                Value::Bool(b) => Ok(PgBindValue::Bool(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(PgBindValue::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(PgBindValue::Bool(false)),
                _ => Err("must be a boolean".into()),
            },
            ColumnType::Jsonb => Ok(PgBindValue::Json(v.clone())),
            ColumnType::Timestamptz => match v {
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .map(|d| PgBindValue::Timestamp(d.with_timezone(&Utc)))
                    .map_err(|_| "must be an RFC 3339 timestamp".to_string()),
                _ => Err("must be an RFC 3339 timestamp".into()),
            },
        }
    }

    /// JSON form of the bound value (used by the in-memory store so both stores agree on types).
    pub fn to_json(&self) -> Value {
        match self {
            PgBindValue::Null(_) => Value::Null,
            PgBindValue::Bool(b) => Value::Bool(*b),
            PgBindValue::I32(n) => Value::Number((*n).into()),
            PgBindValue::I64(n) => Value::Number((*n).into()),
            PgBindValue::F64(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            PgBindValue::String(s) => Value::String(s.clone()),
            PgBindValue::Json(v) => v.clone(),
            PgBindValue::Timestamp(d) => Value::String(d.to_rfc3339()),
        }
    }

    fn type_info_for(&self) -> PgTypeInfo {
        let ty = match self {
            PgBindValue::Null(ty) => *ty,
            PgBindValue::Bool(_) => ColumnType::Bool,
            PgBindValue::I32(_) => ColumnType::Int,
            PgBindValue::I64(_) => ColumnType::BigInt,
            PgBindValue::F64(_) => ColumnType::Double,
            PgBindValue::String(_) => ColumnType::Text,
            PgBindValue::Json(_) => ColumnType::Jsonb,
            PgBindValue::Timestamp(_) => ColumnType::Timestamptz,
        };
        match ty {
            ColumnType::Bool => <bool as sqlx::Type<Postgres>>::type_info(),
            ColumnType::Int => <i32 as sqlx::Type<Postgres>>::type_info(),
            ColumnType::BigInt => <i64 as sqlx::Type<Postgres>>::type_info(),
            ColumnType::Double => <f64 as sqlx::Type<Postgres>>::type_info(),
            ColumnType::Text => <String as sqlx::Type<Postgres>>::type_info(),
            ColumnType::Jsonb => <Value as sqlx::Type<Postgres>>::type_info(),
            ColumnType::Timestamptz => <DateTime<Utc> as sqlx::Type<Postgres>>::type_info(),
        }
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null(_) => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I32(n) => <i32 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf)?,
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
            PgBindValue::Timestamp(d) => <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(d, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.type_info_for())
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_by_column_type() {
        assert_eq!(PgBindValue::for_column(ColumnType::Int, &json!("4")), Ok(PgBindValue::I32(4)));
        assert_eq!(PgBindValue::for_column(ColumnType::Bool, &json!("TRUE")), Ok(PgBindValue::Bool(true)));
        assert_eq!(PgBindValue::for_column(ColumnType::Text, &json!(null)), Ok(PgBindValue::Null(ColumnType::Text)));
        assert!(PgBindValue::for_column(ColumnType::Int, &json!("four")).is_err());
        assert!(PgBindValue::for_column(ColumnType::Bool, &json!(1)).is_err());
        assert!(PgBindValue::for_column(ColumnType::Int, &json!(1u64 << 40)).is_err());
    }

    #[test]
    fn json_view_matches_input() {
        let v = PgBindValue::for_column(ColumnType::Jsonb, &json!(["a", "b"])).unwrap();
        assert_eq!(v.to_json(), json!(["a", "b"]));
        let d = PgBindValue::for_column(ColumnType::Double, &json!(12.5)).unwrap();
        assert_eq!(d.to_json(), json!(12.5));
    }
}
