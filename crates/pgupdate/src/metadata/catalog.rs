//! Catalog lookups against `pg_catalog`.

use crate::client::GenericClient;
use crate::error::{UpdateError, UpdateResult};
use crate::row::RowExt;
use tokio_postgres::types::Type;

/// Relation kinds an update may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    PartitionedTable,
    View,
    ForeignTable,
    Other,
}

impl RelationKind {
    fn from_relkind(relkind: i8) -> Self {
        // Postgres stores `relkind` as a "char" internally. tokio-postgres exposes it as i8.
        match relkind as u8 as char {
            'r' => Self::Table,
            'p' => Self::PartitionedTable,
            'v' => Self::View,
            'f' => Self::ForeignTable,
            _ => Self::Other,
        }
    }
}

/// What to look up: names are already folded to the case the catalog stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLookup {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    /// Also resolve relations that stand in for another one (views, foreign tables).
    ///
    /// PostgreSQL has no synonym objects; these are the closest equivalent.
    pub include_synonyms: bool,
}

impl TableLookup {
    /// `relkind` codes matched by this lookup.
    pub fn relkinds(&self) -> Vec<String> {
        let mut kinds = vec!["r".to_string(), "p".to_string()];
        if self.include_synonyms {
            kinds.push("v".to_string());
            kinds.push("f".to_string());
        }
        kinds
    }
}

/// One column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    /// `Type::UNKNOWN` for types tokio-postgres does not know statically (enums, domains, ...).
    pub sql_type: Type,
    pub nullable: bool,
    pub ordinal: i16,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, sql_type: Type) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            ordinal: 0,
        }
    }
}

/// A relation found in the catalog, with its columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTable {
    pub schema: String,
    pub name: String,
    pub kind: RelationKind,
    pub columns: Vec<ColumnMetadata>,
}

const CURRENT_DATABASE_SQL: &str = "SELECT current_database()::text AS catalog_name";

const TABLE_COLUMNS_SQL: &str = r#"
SELECT
  n.nspname::text AS schema_name,
  c.relname::text AS table_name,
  c.relkind AS relkind,
  a.attname::text AS column_name,
  a.attnum AS ordinal,
  a.atttypid AS type_oid,
  a.attnotnull AS not_null
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_attribute a
  ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
WHERE c.relname::text = $1::text
  AND c.relkind::text = ANY($2::text[])
  AND (
    ($3::text IS NULL AND pg_catalog.pg_table_is_visible(c.oid))
    OR n.nspname::text = $3::text
  )
ORDER BY n.nspname, a.attnum
"#;

/// Resolve `lookup` through `client` and load the table's columns.
///
/// Without a schema the table is resolved through the session `search_path`.
pub async fn load_table_columns<C: GenericClient + ?Sized>(
    client: &C,
    lookup: &TableLookup,
) -> UpdateResult<Option<ResolvedTable>> {
    if let Some(catalog) = &lookup.catalog {
        let rows = client.query(CURRENT_DATABASE_SQL, &[]).await?;
        let current: String = match rows.first() {
            Some(row) => row.try_get_column("catalog_name")?,
            None => return Err(UpdateError::metadata("current_database() returned no row")),
        };
        if &current != catalog {
            return Err(UpdateError::metadata(format!(
                "Catalog '{catalog}' does not match the connected database '{current}'"
            )));
        }
    }

    let relkinds = lookup.relkinds();
    let rows = client
        .query(
            TABLE_COLUMNS_SQL,
            &[&lookup.table, &relkinds, &lookup.schema],
        )
        .await?;

    let mut table: Option<ResolvedTable> = None;
    for row in rows {
        let schema_name: String = row.try_get_column("schema_name")?;
        let table_name: String = row.try_get_column("table_name")?;

        let relkind: i8 = row.try_get_column("relkind")?;

        if let Some(t) = &table {
            if t.schema != schema_name {
                return Err(UpdateError::metadata(format!(
                    "Table '{}' is ambiguous: found in schemas '{}' and '{}'",
                    lookup.table, t.schema, schema_name
                )));
            }
        }
        let current = table.get_or_insert_with(|| ResolvedTable {
            schema: schema_name,
            name: table_name,
            kind: RelationKind::from_relkind(relkind),
            columns: Vec::new(),
        });

        // LEFT JOIN: a relation without columns still yields one row.
        let column_name: Option<String> = row.try_get_column("column_name")?;
        let Some(column_name) = column_name else {
            continue;
        };
        let ordinal: i16 = row.try_get_column("ordinal")?;
        let type_oid: u32 = row.try_get_column("type_oid")?;
        let not_null: bool = row.try_get_column("not_null")?;

        current.columns.push(ColumnMetadata {
            name: column_name,
            sql_type: Type::from_oid(type_oid).unwrap_or(Type::UNKNOWN),
            nullable: !not_null,
            ordinal,
        });
    }

    Ok(table)
}
