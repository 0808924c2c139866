//! Compile-once UPDATE statements.
//!
//! A [`SimpleUpdate`] is configured with a table, the columns to set and the columns that
//! restrict the update. On first use it reads the table's metadata, fills in the column list
//! when none was declared, renders the SQL and the parameter type vector, and caches the
//! result. Every later execution binds values by name against that compiled statement.
//!
//! ```ignore
//! use pgupdate::{Operator, SimpleUpdate, SqlValue};
//! use std::collections::HashMap;
//!
//! let update = SimpleUpdate::new(&client)
//!     .with_table_name("dummy_table")?
//!     .updating_columns(["a_string", "an_int", "a_bool"])?
//!     .restricting_columns_with([("key_1", Operator::Equals), ("key_2", Operator::LessThan)])?;
//!
//! let values = HashMap::from([
//!     ("a_string".to_string(), SqlValue::from("Hello")),
//!     ("an_int".to_string(), SqlValue::from(42)),
//!     ("a_bool".to_string(), SqlValue::from(true)),
//! ]);
//! let keys = HashMap::from([
//!     ("key_1".to_string(), SqlValue::from("Pwet")),
//!     ("key_2".to_string(), SqlValue::from(3)),
//! ]);
//! let affected = update.execute(&values, &keys).await?;
//! ```

mod compiled;
mod hook;

#[cfg(test)]
mod tests;

pub use compiled::CompiledUpdate;
pub use hook::{CompileHook, TracingCompileHook};

use crate::client::GenericClient;
use crate::error::{UpdateError, UpdateResult};
use crate::metadata::{MetadataOptions, TableMetadataContext};
use crate::source::{ParameterSource, TypedValue};
use crate::value::SqlValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_postgres::types::{ToSql, Type};

/// Comparison operator of a restricting column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Equals,
    LessThan,
    GreaterThan,
}

impl Operator {
    /// The SQL token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameterized UPDATE against one table, compiled once from live metadata.
///
/// Configuration methods fail with [`UpdateError::ConfigurationLocked`] once the update has
/// been compiled. Compilation happens on [`SimpleUpdate::compile`] or implicitly on the first
/// execution; concurrent callers share a single compilation. A failed compilation leaves the
/// update uncompiled and the next call retries.
pub struct SimpleUpdate<C> {
    client: C,
    context: TableMetadataContext,
    declared_columns: Vec<String>,
    restricting_columns: Vec<(String, Operator)>,
    hooks: Vec<Arc<dyn CompileHook>>,
    compiled: OnceCell<CompiledUpdate>,
}

impl<C> fmt::Debug for SimpleUpdate<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleUpdate")
            .field("context", &self.context)
            .field("declared_columns", &self.declared_columns)
            .field("restricting_columns", &self.restricting_columns)
            .field("hooks", &self.hooks.len())
            .field("compiled", &self.compiled.get())
            .finish()
    }
}

impl<C: GenericClient> SimpleUpdate<C> {
    /// Create an unconfigured update running on `client`.
    pub fn new(client: C) -> Self {
        Self {
            client,
            context: TableMetadataContext::new(),
            declared_columns: Vec::new(),
            restricting_columns: Vec::new(),
            hooks: Vec::new(),
            compiled: OnceCell::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn metadata_context(&self) -> &TableMetadataContext {
        &self.context
    }

    fn check_configurable(&self) -> UpdateResult<()> {
        if self.compiled.initialized() {
            return Err(UpdateError::ConfigurationLocked);
        }
        Ok(())
    }

    // ==================== Configuration ====================

    pub fn set_table_name(&mut self, name: impl Into<String>) -> UpdateResult<()> {
        self.check_configurable()?;
        self.context.set_table_name(name);
        Ok(())
    }

    pub fn set_schema_name(&mut self, name: impl Into<String>) -> UpdateResult<()> {
        self.check_configurable()?;
        self.context.set_schema_name(name);
        Ok(())
    }

    pub fn set_catalog_name(&mut self, name: impl Into<String>) -> UpdateResult<()> {
        self.check_configurable()?;
        self.context.set_catalog_name(name);
        Ok(())
    }

    /// Replace the declared update columns. An empty list means "every column of the table".
    pub fn set_updating_columns<I, S>(&mut self, columns: I) -> UpdateResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_configurable()?;
        self.declared_columns = columns.into_iter().map(Into::into).collect();
        Ok(())
    }

    /// Replace the restricting columns, each compared with `=`.
    pub fn set_restricting_columns<I, S>(&mut self, columns: I) -> UpdateResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_restricting_columns_with(columns.into_iter().map(|c| (c, Operator::Equals)))
    }

    /// Replace the restricting columns with explicit operators.
    ///
    /// Names are unique; a repeated name keeps its first position and takes the last operator.
    pub fn set_restricting_columns_with<I, S>(&mut self, columns: I) -> UpdateResult<()>
    where
        I: IntoIterator<Item = (S, Operator)>,
        S: Into<String>,
    {
        self.check_configurable()?;
        let mut restricting: Vec<(String, Operator)> = Vec::new();
        for (name, op) in columns {
            let name = name.into();
            match restricting.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => entry.1 = op,
                None => restricting.push((name, op)),
            }
        }
        self.restricting_columns = restricting;
        Ok(())
    }

    pub fn set_access_table_column_metadata(&mut self, enabled: bool) -> UpdateResult<()> {
        self.check_configurable()?;
        self.context.set_access_table_column_metadata(enabled);
        Ok(())
    }

    pub fn set_override_include_synonyms_default(&mut self, enabled: bool) -> UpdateResult<()> {
        self.check_configurable()?;
        self.context.set_override_include_synonyms_default(enabled);
        Ok(())
    }

    /// Replace both metadata lookup options at once.
    pub fn set_metadata_options(&mut self, options: MetadataOptions) -> UpdateResult<()> {
        self.check_configurable()?;
        self.context.set_options(options);
        Ok(())
    }

    /// Register a hook run once, right after a successful compilation.
    pub fn add_compile_hook(&mut self, hook: impl CompileHook + 'static) -> UpdateResult<()> {
        self.check_configurable()?;
        self.hooks.push(Arc::new(hook));
        Ok(())
    }

    // ==================== Fluent configuration ====================

    pub fn with_table_name(mut self, name: impl Into<String>) -> UpdateResult<Self> {
        self.set_table_name(name)?;
        Ok(self)
    }

    pub fn with_schema_name(mut self, name: impl Into<String>) -> UpdateResult<Self> {
        self.set_schema_name(name)?;
        Ok(self)
    }

    pub fn with_catalog_name(mut self, name: impl Into<String>) -> UpdateResult<Self> {
        self.set_catalog_name(name)?;
        Ok(self)
    }

    pub fn updating_columns<I, S>(mut self, columns: I) -> UpdateResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_updating_columns(columns)?;
        Ok(self)
    }

    pub fn restricting_columns<I, S>(mut self, columns: I) -> UpdateResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_restricting_columns(columns)?;
        Ok(self)
    }

    pub fn restricting_columns_with<I, S>(mut self, columns: I) -> UpdateResult<Self>
    where
        I: IntoIterator<Item = (S, Operator)>,
        S: Into<String>,
    {
        self.set_restricting_columns_with(columns)?;
        Ok(self)
    }

    pub fn without_table_column_metadata_access(mut self) -> UpdateResult<Self> {
        self.set_access_table_column_metadata(false)?;
        Ok(self)
    }

    pub fn include_synonyms_for_table_column_metadata(mut self) -> UpdateResult<Self> {
        self.set_override_include_synonyms_default(true)?;
        Ok(self)
    }

    pub fn with_metadata_options(mut self, options: MetadataOptions) -> UpdateResult<Self> {
        self.set_metadata_options(options)?;
        Ok(self)
    }

    pub fn on_compile(mut self, hook: impl CompileHook + 'static) -> UpdateResult<Self> {
        self.add_compile_hook(hook)?;
        Ok(self)
    }

    // ==================== Accessors ====================

    pub fn table_name(&self) -> Option<&str> {
        self.context.table_name()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.context.schema_name()
    }

    pub fn catalog_name(&self) -> Option<&str> {
        self.context.catalog_name()
    }

    pub fn declared_updating_columns(&self) -> &[String] {
        &self.declared_columns
    }

    pub fn restricting_columns_list(&self) -> &[(String, Operator)] {
        &self.restricting_columns
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.initialized()
    }

    /// The compiled statement, if compilation has happened.
    pub fn compiled(&self) -> Option<&CompiledUpdate> {
        self.compiled.get()
    }

    /// The compiled SQL text.
    pub fn sql(&self) -> Option<&str> {
        self.compiled.get().map(CompiledUpdate::sql)
    }

    /// The compiled parameter types.
    pub fn column_types(&self) -> Option<&[Type]> {
        self.compiled.get().map(CompiledUpdate::column_types)
    }

    /// The update columns the statement was compiled with.
    pub fn update_columns(&self) -> Option<&[String]> {
        self.compiled.get().map(CompiledUpdate::update_columns)
    }

    // ==================== Compilation ====================

    /// Compile the update, or return the existing compilation.
    pub async fn compile(&self) -> UpdateResult<&CompiledUpdate> {
        self.compiled.get_or_try_init(|| self.compile_internal()).await
    }

    async fn compile_if_necessary(&self) -> UpdateResult<&CompiledUpdate> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }
        tracing::debug!(
            target: "pgupdate",
            table = self.context.table_name().unwrap_or_default(),
            "update not compiled before execution, compiling now"
        );
        self.compile().await
    }

    async fn compile_internal(&self) -> UpdateResult<CompiledUpdate> {
        let table = match self.context.table_name() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(UpdateError::MissingTableName),
        };
        tracing::debug!(target: "pgupdate", table, "compiling update");

        if !self.client.is_ready() {
            return Err(UpdateError::Connection(
                "client is not ready to run statements".to_string(),
            ));
        }

        let provider = self.context.process_metadata(&self.client).await?;

        let compiled = CompiledUpdate::build(
            &self.context,
            &self.declared_columns,
            &self.restricting_columns,
            provider,
        )?;

        for hook in &self.hooks {
            hook.on_compile(&compiled);
        }

        tracing::debug!(
            target: "pgupdate",
            sql = %compiled.sql(),
            params = compiled.column_types().len(),
            "compiled update"
        );
        Ok(compiled)
    }

    // ==================== Execution ====================

    /// Execute with plain maps of values; keys match column names ignoring case.
    ///
    /// Columns without a value bind NULL. Returns the number of updated rows.
    pub async fn execute(
        &self,
        updating_values: &HashMap<String, SqlValue>,
        restricting_values: &HashMap<String, SqlValue>,
    ) -> UpdateResult<u64> {
        let compiled = self.compile_if_necessary().await?;
        let mut values = self
            .context
            .sort_and_type_in_parameter(updating_values, compiled.update_columns());
        values.extend(
            self.context
                .sort_and_type_in_parameter(restricting_values, &compiled.restricting_names()),
        );
        self.execute_values(compiled, values).await
    }

    /// Execute with named parameter sources.
    ///
    /// Names resolve exactly, lower-cased, camelCased and then ignoring case. Columns
    /// without a value bind NULL. A type registered in a source overrides the column type
    /// for that parameter. Returns the number of updated rows.
    pub async fn execute_source<U, R>(
        &self,
        updating_source: &U,
        restricting_source: &R,
    ) -> UpdateResult<u64>
    where
        U: ParameterSource + ?Sized + Sync,
        R: ParameterSource + ?Sized + Sync,
    {
        let compiled = self.compile_if_necessary().await?;
        let mut values = self
            .context
            .sort_and_type_in_parameter_source(updating_source, compiled.update_columns());
        values.extend(
            self.context
                .sort_and_type_in_parameter_source(restricting_source, &compiled.restricting_names()),
        );
        self.execute_values(compiled, values).await
    }

    async fn execute_values(
        &self,
        compiled: &CompiledUpdate,
        values: Vec<TypedValue>,
    ) -> UpdateResult<u64> {
        let types = compiled.types_for(&values);
        let params: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|v| &v.value as &(dyn ToSql + Sync))
            .collect();

        tracing::trace!(
            target: "pgupdate",
            sql = %compiled.sql(),
            param_count = params.len(),
            "executing update"
        );

        self.client
            .execute_typed(compiled.sql(), &params, &types)
            .await
    }
}
