//! Matching named input values to compiled column positions.
//!
//! Catalog names and caller-supplied names rarely agree on case or naming convention, so
//! each column is looked up through an ordered list of [`Resolver`]s. The first resolver that
//! produces a name the source actually has wins. When none does, the column binds NULL:
//! a missing value is never an error.

use crate::source::{ParameterSource, TypedValue};
use crate::value::SqlValue;
use std::collections::HashMap;

/// Lower-cased parameter name -> name as registered in the source.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveIndex {
    names: HashMap<String, String>,
}

impl CaseInsensitiveIndex {
    pub fn build<S: ParameterSource + ?Sized>(source: &S) -> Self {
        let names = source
            .parameter_names()
            .into_iter()
            .map(|name| (name.to_lowercase(), name))
            .collect();
        Self { names }
    }

    pub fn get(&self, lower_case_name: &str) -> Option<&str> {
        self.names.get(lower_case_name).map(String::as_str)
    }
}

/// One way of deriving the parameter name that feeds a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// The column name as written.
    Exact,
    /// The column name lower-cased.
    LowerCase,
    /// `a_column` -> `aColumn`.
    UnderscoreToCamelCase,
    /// Any registered name equal to the column ignoring case.
    CaseInsensitiveIndex,
}

/// Resolution order for [`ParameterSource`] inputs.
pub const SOURCE_RESOLVERS: [Resolver; 4] = [
    Resolver::Exact,
    Resolver::LowerCase,
    Resolver::UnderscoreToCamelCase,
    Resolver::CaseInsensitiveIndex,
];

impl Resolver {
    /// The parameter name this resolver proposes for `column`.
    pub fn candidate(self, column: &str, index: &CaseInsensitiveIndex) -> Option<String> {
        match self {
            Self::Exact => Some(column.to_string()),
            Self::LowerCase => Some(column.to_lowercase()),
            Self::UnderscoreToCamelCase => Some(underscore_to_camel_case(column)),
            Self::CaseInsensitiveIndex => index.get(&column.to_lowercase()).map(str::to_string),
        }
    }
}

/// Convert an underscore name (`a_column`, `A_COLUMN`) to its property name (`aColumn`).
///
/// Underscores are dropped and the character after each one is upper-cased. Every other
/// character is lower-cased, so `myURL_x` becomes `myurlX` rather than `myUrlX`. Characters
/// such as `$` are kept. A leading underscore is kept as is.
pub fn underscore_to_camel_case(name: &str) -> String {
    let mut chars = name.chars();
    let mut property = String::with_capacity(name.len());
    property.extend(chars.next().into_iter().flat_map(char::to_lowercase));

    let mut next_is_upper = false;
    for c in chars {
        if c == '_' {
            next_is_upper = true;
        } else if next_is_upper {
            property.extend(c.to_uppercase());
            next_is_upper = false;
        } else {
            property.extend(c.to_lowercase());
        }
    }
    property
}

/// Resolve one column against a parameter source.
pub fn resolve_column<S: ParameterSource + ?Sized>(
    source: &S,
    column: &str,
    index: &CaseInsensitiveIndex,
) -> Option<TypedValue> {
    SOURCE_RESOLVERS.iter().find_map(|resolver| {
        let name = resolver.candidate(column, index)?;
        if source.has_value(&name) {
            source.typed_value(&name)
        } else {
            None
        }
    })
}

/// Order the values of a parameter source by `columns`, binding NULL for unmatched columns.
pub fn sort_source_values<S: ParameterSource + ?Sized>(
    source: &S,
    columns: &[String],
) -> Vec<TypedValue> {
    let index = CaseInsensitiveIndex::build(source);
    columns
        .iter()
        .map(|column| resolve_column(source, column, &index).unwrap_or_else(TypedValue::null))
        .collect()
}

/// Order the values of a plain map by `columns`, binding NULL for unmatched columns.
///
/// Keys match case-insensitively only; unlike [`sort_source_values`] there is no camelCase
/// fallback, so `aColumn` does not feed `a_column` here.
pub fn sort_map_values(values: &HashMap<String, SqlValue>, columns: &[String]) -> Vec<TypedValue> {
    let lower_cased: HashMap<String, &SqlValue> = values
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value))
        .collect();
    columns
        .iter()
        .map(|column| match lower_cased.get(&column.to_lowercase()) {
            Some(value) => TypedValue::new((*value).clone()),
            None => TypedValue::null(),
        })
        .collect()
}
