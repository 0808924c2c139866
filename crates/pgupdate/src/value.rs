//! Dynamically typed bind values.
//!
//! Values for an update arrive by name in a bag whose element types are only known at
//! runtime, while the target column types come from the catalog. [`SqlValue`] bridges
//! the two: it accepts every parameter type and writes itself in the representation the
//! statement expects. Integer and float widths are converted only when the value survives
//! the conversion exactly, and text is parsed when it targets a uuid, date, timestamp or
//! numeric column, which is how those types arrive from a serialized struct.
//!
//! ```ignore
//! use pgupdate::SqlValue;
//!
//! let values = vec![SqlValue::from("Hello"), SqlValue::from(42), SqlValue::Null];
//! ```

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::error::Error;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A single bind value whose Rust type is decided at runtime.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// SQL NULL; binds to any parameter type.
    #[default]
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Bytea(Vec<u8>),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    #[cfg(feature = "rust_decimal")]
    Numeric(rust_decimal::Decimal),
}

impl SqlValue {
    /// Whether this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert a JSON value, keeping scalars scalar.
    ///
    /// Arrays and objects stay JSON; integers that fit `i64` become `Int8`, other numbers `Float8`.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int8(i),
                None => n.as_f64().map_or(Self::Json(Value::Number(n)), Self::Float8),
            },
            Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

/// Largest magnitude an `f64` holds for every integer up to it.
const F64_EXACT_INT: u64 = 1 << 53;
/// Largest magnitude an `f32` holds for every integer up to it.
const F32_EXACT_INT: u64 = 1 << 24;

fn inexact(value: impl std::fmt::Display, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("value {value} cannot be represented exactly as {ty}").into()
}

fn write_integer(
    value: i64,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    if *ty == Type::INT2 {
        i16::try_from(value)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(value)?.to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        if value.unsigned_abs() > F64_EXACT_INT {
            return Err(inexact(value, ty));
        }
        (value as f64).to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        if value.unsigned_abs() > F32_EXACT_INT {
            return Err(inexact(value, ty));
        }
        (value as f32).to_sql(ty, out)
    } else {
        #[cfg(feature = "rust_decimal")]
        if *ty == Type::NUMERIC {
            return rust_decimal::Decimal::from(value).to_sql(ty, out);
        }
        value.to_sql_checked(ty, out)
    }
}

fn write_float(
    value: f64,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    if *ty == Type::FLOAT4 {
        (value as f32).to_sql(ty, out)
    } else {
        #[cfg(feature = "rust_decimal")]
        if *ty == Type::NUMERIC {
            return rust_decimal::Decimal::try_from(value)?.to_sql(ty, out);
        }
        value.to_sql_checked(ty, out)
    }
}

fn write_text(
    value: &str,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    if *ty == Type::UUID {
        Uuid::parse_str(value)?.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMP {
        parse_timestamp(value)?.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMPTZ {
        value.parse::<DateTime<Utc>>()?.to_sql(ty, out)
    } else if *ty == Type::DATE {
        value.parse::<NaiveDate>()?.to_sql(ty, out)
    } else if matches!(ty.kind(), Kind::Enum(_)) {
        // Enum labels travel as their raw UTF-8 bytes.
        out.extend_from_slice(value.as_bytes());
        Ok(IsNull::No)
    } else {
        #[cfg(feature = "rust_decimal")]
        if *ty == Type::NUMERIC {
            return value.parse::<rust_decimal::Decimal>()?.to_sql(ty, out);
        }
        value.to_sql_checked(ty, out)
    }
}

/// ISO 8601 as chrono serializes it, or the space-separated form Postgres prints.
fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    value
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => v.to_sql_checked(ty, out),
            Self::Int2(v) => write_integer(i64::from(*v), ty, out),
            Self::Int4(v) => write_integer(i64::from(*v), ty, out),
            Self::Int8(v) => write_integer(*v, ty, out),
            Self::Float4(v) => write_float(f64::from(*v), ty, out),
            Self::Float8(v) => write_float(*v, ty, out),
            Self::Text(v) => write_text(v, ty, out),
            Self::Bytea(v) => v.to_sql_checked(ty, out),
            Self::Json(v) => v.to_sql_checked(ty, out),
            Self::Uuid(v) => v.to_sql_checked(ty, out),
            Self::Timestamp(v) => v.to_sql_checked(ty, out),
            Self::TimestampTz(v) => v.to_sql_checked(ty, out),
            Self::Date(v) => v.to_sql_checked(ty, out),
            #[cfg(feature = "rust_decimal")]
            Self::Numeric(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for SqlValue {
                fn from(value: $t) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    String => Text,
    Vec<u8> => Bytea,
    Uuid => Uuid,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
}

#[cfg(feature = "rust_decimal")]
impl_from! {
    rust_decimal::Decimal => Numeric,
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
