use crate::metadata::catalog::{ColumnMetadata, ResolvedTable};
use std::collections::HashMap;
use tokio_postgres::types::Type;

/// Sentinel for columns whose type is not known; the server infers it at prepare time.
pub const TYPE_UNKNOWN: Type = Type::UNKNOWN;

/// Generated-key capabilities of the connected database.
///
/// Not used by the update path; exposed for callers layering inserts on the same metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedKeySupport {
    pub supported: bool,
    /// Keys are obtained by rewriting the statement rather than through a driver API.
    pub simulated: bool,
    pub column_name_array_supported: bool,
}

impl GeneratedKeySupport {
    /// PostgreSQL returns generated keys through `RETURNING`.
    pub const POSTGRES: Self = Self {
        supported: true,
        simulated: true,
        column_name_array_supported: true,
    };
}

/// Resolved column metadata for one table.
///
/// Obtained from [`TableMetadataContext::process_metadata`](super::TableMetadataContext::process_metadata);
/// column lists and type vectors can only be derived once metadata has been processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadataProvider {
    table: Option<ResolvedTable>,
    columns: Vec<ColumnMetadata>,
    generated_keys: GeneratedKeySupport,
}

impl TableMetadataProvider {
    /// A provider over a table found in the catalog.
    pub fn from_table(table: ResolvedTable) -> Self {
        Self {
            columns: table.columns.clone(),
            table: Some(table),
            generated_keys: GeneratedKeySupport::POSTGRES,
        }
    }

    /// A provider over a known column list, without catalog identity.
    pub fn from_columns(columns: Vec<ColumnMetadata>) -> Self {
        Self {
            table: None,
            columns,
            generated_keys: GeneratedKeySupport::POSTGRES,
        }
    }

    /// A provider that knows no columns (column metadata access disabled).
    pub fn empty() -> Self {
        Self::from_columns(Vec::new())
    }

    /// The catalog relation, when one was looked up.
    pub fn table(&self) -> Option<&ResolvedTable> {
        self.table.as_ref()
    }

    pub fn column_metadata(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Column names in catalog order.
    pub fn create_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Types for `columns`, position by position.
    ///
    /// Names match ignoring case. `None` entries and names the catalog does not know
    /// map to [`TYPE_UNKNOWN`].
    pub fn create_column_types<I, S>(&self, columns: I) -> Vec<Type>
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let by_name: HashMap<String, &Type> = self
            .columns
            .iter()
            .map(|c| (c.name.to_uppercase(), &c.sql_type))
            .collect();

        columns
            .into_iter()
            .map(|column| {
                column
                    .and_then(|name| by_name.get(&name.as_ref().to_uppercase()).copied())
                    .cloned()
                    .unwrap_or(TYPE_UNKNOWN)
            })
            .collect()
    }

    pub fn is_get_generated_keys_supported(&self) -> bool {
        self.generated_keys.supported
    }

    pub fn is_get_generated_keys_simulated(&self) -> bool {
        self.generated_keys.simulated
    }

    pub fn is_generated_keys_column_name_array_supported(&self) -> bool {
        self.generated_keys.column_name_array_supported
    }

    /// Statement suffix that makes an INSERT into `table_name` report `key_column_name`.
    pub fn generated_key_simulation_query(
        &self,
        table_name: &str,
        key_column_name: &str,
    ) -> Option<String> {
        let _ = table_name;
        self.generated_keys
            .simulated
            .then(|| format!("RETURNING {key_column_name}"))
    }
}
