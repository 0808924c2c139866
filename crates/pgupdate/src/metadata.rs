//! Table metadata: catalog lookups, column types and parameter matching.
//!
//! [`TableMetadataContext`] carries the table identity and lookup options of an update.
//! [`TableMetadataContext::process_metadata`] asks the client's catalog for the table and
//! returns a [`TableMetadataProvider`], from which the column list and the type vector of
//! the compiled statement are derived. The context never modifies the database.

pub mod catalog;
pub mod provider;
pub mod resolve;

pub use catalog::{ColumnMetadata, RelationKind, ResolvedTable, TableLookup};
pub use provider::{GeneratedKeySupport, TYPE_UNKNOWN, TableMetadataProvider};
pub use resolve::{CaseInsensitiveIndex, Resolver, SOURCE_RESOLVERS};

use crate::client::GenericClient;
use crate::error::{UpdateError, UpdateResult};
use crate::ident::Ident;
use crate::source::{ParameterSource, TypedValue};
use crate::value::SqlValue;
use std::collections::HashMap;

/// How table metadata is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOptions {
    /// Query the catalog for column names and types. When off, every type is
    /// unknown and update columns must be declared.
    pub access_table_column_metadata: bool,
    /// Also resolve views and foreign tables standing in for a table.
    pub include_synonyms: bool,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            access_table_column_metadata: true,
            include_synonyms: false,
        }
    }
}

impl MetadataOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_table_column_metadata(mut self, enabled: bool) -> Self {
        self.access_table_column_metadata = enabled;
        self
    }

    pub fn include_synonyms(mut self, enabled: bool) -> Self {
        self.include_synonyms = enabled;
        self
    }
}

/// Table identity plus lookup options for one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadataContext {
    table_name: Option<String>,
    schema_name: Option<String>,
    catalog_name: Option<String>,
    options: MetadataOptions,
}

impl TableMetadataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn set_table_name(&mut self, name: impl Into<String>) {
        self.table_name = Some(name.into());
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    pub fn set_schema_name(&mut self, name: impl Into<String>) {
        self.schema_name = Some(name.into());
    }

    pub fn catalog_name(&self) -> Option<&str> {
        self.catalog_name.as_deref()
    }

    pub fn set_catalog_name(&mut self, name: impl Into<String>) {
        self.catalog_name = Some(name.into());
    }

    pub fn options(&self) -> &MetadataOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: MetadataOptions) {
        self.options = options;
    }

    pub fn set_access_table_column_metadata(&mut self, enabled: bool) {
        self.options.access_table_column_metadata = enabled;
    }

    pub fn set_override_include_synonyms_default(&mut self, enabled: bool) {
        self.options.include_synonyms = enabled;
    }

    /// The catalog lookup for the configured identity.
    ///
    /// Unquoted names are folded to lower case, quoted names are taken literally.
    pub fn lookup(&self) -> UpdateResult<TableLookup> {
        let table = match self.table_name.as_deref() {
            Some(name) if !name.is_empty() => Ident::parse_part(name)?.catalog_name(),
            _ => return Err(UpdateError::MissingTableName),
        };
        let fold = |name: Option<&str>| -> UpdateResult<Option<String>> {
            name.map(|n| Ident::parse_part(n).map(|part| part.catalog_name()))
                .transpose()
        };
        Ok(TableLookup {
            catalog: fold(self.catalog_name.as_deref())?,
            schema: fold(self.schema_name.as_deref())?,
            table,
            include_synonyms: self.options.include_synonyms,
        })
    }

    /// Look the table up through `client` and return its metadata.
    ///
    /// Fails with [`UpdateError::MetadataAccess`] when the catalog cannot be read or the
    /// table does not exist. With column metadata access disabled no query is issued and
    /// the provider is empty.
    pub async fn process_metadata<C: GenericClient>(
        &self,
        client: &C,
    ) -> UpdateResult<TableMetadataProvider> {
        let lookup = self.lookup()?;

        if !self.options.access_table_column_metadata {
            tracing::debug!(
                target: "pgupdate",
                table = %lookup.table,
                "column metadata access disabled; skipping catalog lookup"
            );
            return Ok(TableMetadataProvider::empty());
        }

        if lookup.include_synonyms {
            tracing::debug!(
                target: "pgupdate",
                table = %lookup.table,
                "including views and foreign tables in table lookup"
            );
        }

        let table = client
            .table_columns(&lookup)
            .await
            .map_err(UpdateError::into_metadata)?
            .ok_or_else(|| {
                UpdateError::metadata(format!(
                    "Unable to locate table meta-data for '{}'{}",
                    lookup.table,
                    lookup
                        .schema
                        .as_deref()
                        .map(|s| format!(" in schema '{s}'"))
                        .unwrap_or_default()
                ))
            })?;

        tracing::debug!(
            target: "pgupdate",
            schema = %table.schema,
            table = %table.name,
            columns = table.columns.len(),
            "retrieved table metadata"
        );

        Ok(TableMetadataProvider::from_table(table))
    }

    /// Order the values of a parameter source by `columns`.
    ///
    /// Each column is matched through [`SOURCE_RESOLVERS`]; unmatched columns bind NULL.
    pub fn sort_and_type_in_parameter_source<S: ParameterSource + ?Sized>(
        &self,
        source: &S,
        columns: &[String],
    ) -> Vec<TypedValue> {
        resolve::sort_source_values(source, columns)
    }

    /// Order the values of a plain map by `columns`, matching keys ignoring case only.
    pub fn sort_and_type_in_parameter(
        &self,
        values: &HashMap<String, SqlValue>,
        columns: &[String],
    ) -> Vec<TypedValue> {
        resolve::sort_map_values(values, columns)
    }
}
