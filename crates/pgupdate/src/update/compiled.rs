use super::Operator;
use crate::error::{UpdateError, UpdateResult};
use crate::ident::{Ident, IdentPart};
use crate::metadata::{TableMetadataContext, TableMetadataProvider};
use crate::source::TypedValue;
use std::fmt::Write as _;
use tokio_postgres::types::Type;

/// The immutable result of compiling a [`SimpleUpdate`](super::SimpleUpdate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUpdate {
    sql: String,
    column_types: Vec<Type>,
    update_columns: Vec<String>,
    restricting_columns: Vec<(String, Operator)>,
    provider: TableMetadataProvider,
}

impl CompiledUpdate {
    /// Reconcile the update columns against `provider` and render the statement.
    ///
    /// Declared columns are used as given; without any, every column the provider knows is
    /// updated in catalog order.
    pub(crate) fn build(
        context: &TableMetadataContext,
        declared_columns: &[String],
        restricting_columns: &[(String, Operator)],
        provider: TableMetadataProvider,
    ) -> UpdateResult<Self> {
        let table = Ident::parse_part(context.table_name().unwrap_or_default())?;
        let schema = context.schema_name().map(Ident::parse_part).transpose()?;

        let update_parts: Vec<IdentPart> = if declared_columns.is_empty() {
            provider
                .create_columns()
                .iter()
                .map(|name| IdentPart::from_catalog_name(name))
                .collect()
        } else {
            declared_columns
                .iter()
                .map(|name| Ident::parse_part(name))
                .collect::<UpdateResult<_>>()?
        };

        if update_parts.is_empty() {
            return Err(UpdateError::validation(format!(
                "No columns to update for table '{}'; declare update columns or enable column metadata access",
                table.name()
            )));
        }

        let restricting_parts = restricting_columns
            .iter()
            .map(|(name, op)| Ident::parse_part(name).map(|part| (part, *op)))
            .collect::<UpdateResult<Vec<_>>>()?;

        let sql = render_sql(
            &Ident::qualified(schema, table).to_sql(),
            &update_parts,
            &restricting_parts,
        );

        let update_columns: Vec<String> = update_parts.iter().map(|p| p.name().to_string()).collect();
        let restricting_columns: Vec<(String, Operator)> = restricting_parts
            .iter()
            .map(|(part, op)| (part.name().to_string(), *op))
            .collect();

        let column_types = provider.create_column_types(
            update_columns
                .iter()
                .chain(restricting_columns.iter().map(|(name, _)| name))
                .map(Some),
        );

        Ok(Self {
            sql,
            column_types,
            update_columns,
            restricting_columns,
            provider,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter types by position: update columns first, then restricting columns.
    pub fn column_types(&self) -> &[Type] {
        &self.column_types
    }

    pub fn update_columns(&self) -> &[String] {
        &self.update_columns
    }

    pub fn restricting_columns(&self) -> &[(String, Operator)] {
        &self.restricting_columns
    }

    pub fn restricting_names(&self) -> Vec<String> {
        self.restricting_columns
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The metadata the statement was compiled from.
    pub fn provider(&self) -> &TableMetadataProvider {
        &self.provider
    }

    /// Parameter types for one execution, with each value's type hint replacing the
    /// compiled type at its position.
    pub fn types_for(&self, values: &[TypedValue]) -> Vec<Type> {
        self.column_types
            .iter()
            .enumerate()
            .map(|(i, compiled)| {
                values
                    .get(i)
                    .and_then(|v| v.sql_type.clone())
                    .unwrap_or_else(|| compiled.clone())
            })
            .collect()
    }
}

fn render_sql(
    target: &str,
    update_columns: &[IdentPart],
    restricting_columns: &[(IdentPart, Operator)],
) -> String {
    let mut sql = format!("UPDATE {target} SET ");
    let mut idx = 0;

    for (i, column) in update_columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        idx += 1;
        let _ = write!(sql, "{} = ${idx}", column.to_sql());
    }

    if !restricting_columns.is_empty() {
        sql.push_str(" WHERE ");
        for (i, (column, op)) in restricting_columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            idx += 1;
            let _ = write!(sql, "{} {op} ${idx}", column.to_sql());
        }
    }

    sql
}
