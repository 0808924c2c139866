//! Named parameter sources.
//!
//! A [`ParameterSource`] is a bag of named values that can answer "do you have a value
//! for this name?" and hand out that value together with an optional type hint. It is the
//! richer alternative to passing a plain `HashMap<String, SqlValue>` to an update: names
//! are matched with more fallbacks (see [`crate::metadata::resolve`]) and a registered
//! type overrides the catalog type for that parameter.
//!
//! # Example
//! ```ignore
//! use pgupdate::MapParameterSource;
//!
//! let values = MapParameterSource::new()
//!     .add_value("a_string", "Hello")
//!     .add_value("an_int", 42)
//!     .add_value("a_bool", true);
//! ```

use crate::error::{UpdateError, UpdateResult};
use crate::value::SqlValue;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio_postgres::types::Type;

/// A value plus the SQL type it should be bound as, if the caller knows better than the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: SqlValue,
    pub sql_type: Option<Type>,
}

impl TypedValue {
    pub fn new(value: impl Into<SqlValue>) -> Self {
        Self {
            value: value.into(),
            sql_type: None,
        }
    }

    pub fn with_type(value: impl Into<SqlValue>, sql_type: Type) -> Self {
        Self {
            value: value.into(),
            sql_type: Some(sql_type),
        }
    }

    /// The NULL placeholder bound for names nobody supplied.
    pub fn null() -> Self {
        Self::new(SqlValue::Null)
    }
}

/// A bag of named values with presence checks and typed retrieval.
pub trait ParameterSource {
    /// Whether a value (possibly NULL) is registered under exactly `name`.
    fn has_value(&self, name: &str) -> bool;

    /// The value registered under exactly `name`, with its type hint.
    fn typed_value(&self, name: &str) -> Option<TypedValue>;

    /// All registered names, used to build the case-insensitive index.
    fn parameter_names(&self) -> Vec<String>;
}

impl<S: ParameterSource + ?Sized> ParameterSource for &S {
    fn has_value(&self, name: &str) -> bool {
        (**self).has_value(name)
    }

    fn typed_value(&self, name: &str) -> Option<TypedValue> {
        (**self).typed_value(name)
    }

    fn parameter_names(&self) -> Vec<String> {
        (**self).parameter_names()
    }
}

/// A [`ParameterSource`] backed by an ordered map, built fluently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapParameterSource {
    values: BTreeMap<String, SqlValue>,
    types: BTreeMap<String, Type>,
}

impl MapParameterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a value.
    pub fn add_value(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Add (or replace) a value bound as `sql_type`.
    pub fn add_typed_value(
        mut self,
        name: impl Into<String>,
        value: impl Into<SqlValue>,
        sql_type: Type,
    ) -> Self {
        let name = name.into();
        self.types.insert(name.clone(), sql_type);
        self.values.insert(name, value.into());
        self
    }

    /// Register a type hint for a name, independent of its value.
    pub fn register_sql_type(mut self, name: impl Into<String>, sql_type: Type) -> Self {
        self.types.insert(name.into(), sql_type);
        self
    }

    /// Add every entry of `values`.
    pub fn add_values<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<SqlValue>,
    {
        for (name, value) in values {
            self.values.insert(name.into(), value.into());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ParameterSource for MapParameterSource {
    fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn typed_value(&self, name: &str) -> Option<TypedValue> {
        let value = self.values.get(name)?.clone();
        Some(TypedValue {
            value,
            sql_type: self.types.get(name).cloned(),
        })
    }

    fn parameter_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// A [`ParameterSource`] over the fields of any serializable struct.
///
/// Field names are used as parameter names, so a struct with `#[serde(rename_all = "camelCase")]`
/// still matches snake_case columns through the camelCase fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerdeParameterSource {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl SerdeParameterSource {
    /// Serialize `value`; it must serialize to a JSON object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> UpdateResult<Self> {
        match serde_json::to_value(value) {
            Ok(serde_json::Value::Object(fields)) => Ok(Self { fields }),
            Ok(other) => Err(UpdateError::validation(format!(
                "parameter source must serialize to an object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(UpdateError::validation(e.to_string())),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl ParameterSource for SerdeParameterSource {
    fn has_value(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn typed_value(&self, name: &str) -> Option<TypedValue> {
        self.fields
            .get(name)
            .map(|v| TypedValue::new(SqlValue::from_json(v.clone())))
    }

    fn parameter_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_source_reports_presence_and_types() {
        let source = MapParameterSource::new()
            .add_value("a_string", "Hello")
            .add_typed_value("an_int", 42, Type::INT8)
            .add_value("maybe", None::<i32>);

        assert!(source.has_value("a_string"));
        assert!(source.has_value("maybe"));
        assert!(!source.has_value("A_STRING"));

        let typed = source.typed_value("an_int").unwrap();
        assert_eq!(typed.value, SqlValue::Int4(42));
        assert_eq!(typed.sql_type, Some(Type::INT8));
        assert_eq!(source.typed_value("maybe").unwrap().value, SqlValue::Null);
        assert_eq!(source.parameter_names(), vec!["a_string", "an_int", "maybe"]);
    }

    #[test]
    fn serde_source_reads_struct_fields() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Row {
            a_string: String,
            an_int: i32,
        }

        let source = SerdeParameterSource::from_serialize(&Row {
            a_string: "Hello".into(),
            an_int: 42,
        })
        .unwrap();

        assert!(source.has_value("aString"));
        assert_eq!(
            source.typed_value("anInt").unwrap().value,
            SqlValue::Int8(42)
        );
    }

    #[test]
    fn serde_source_values_bind_to_their_column_types() {
        use bytes::BytesMut;
        use chrono::{NaiveDate, NaiveDateTime};
        use tokio_postgres::types::ToSql;
        use uuid::Uuid;

        #[derive(Serialize)]
        struct Entity {
            id: Uuid,
            at: NaiveDateTime,
            day: NaiveDate,
        }

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let at = day.and_hms_opt(0, 0, 0).unwrap();
        let source = SerdeParameterSource::from_serialize(&Entity {
            id: Uuid::nil(),
            at,
            day,
        })
        .unwrap();

        let bind = |name: &str, ty: &Type| {
            let mut out = BytesMut::new();
            source
                .typed_value(name)
                .unwrap()
                .value
                .to_sql_checked(ty, &mut out)
                .unwrap();
            out
        };
        let direct = |value: &dyn ToSql, ty: &Type| {
            let mut out = BytesMut::new();
            value.to_sql_checked(ty, &mut out).unwrap();
            out
        };

        assert_eq!(bind("id", &Type::UUID), direct(&Uuid::nil(), &Type::UUID));
        assert_eq!(bind("at", &Type::TIMESTAMP), direct(&at, &Type::TIMESTAMP));
        assert_eq!(bind("day", &Type::DATE), direct(&day, &Type::DATE));
    }

    #[test]
    fn serde_source_rejects_non_objects() {
        let err = SerdeParameterSource::from_serialize(&[1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
