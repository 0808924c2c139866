//! Generic client trait for unified database access.

use crate::error::{UpdateError, UpdateResult};
use crate::metadata::catalog::{self, ResolvedTable, TableLookup};
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

/// A trait that unifies database clients, transactions and pooled connections.
///
/// This is the execution facility an update compiles against. Statements always run
/// with explicit parameter types, and catalog lookups for the metadata layer go
/// through [`GenericClient::query`].
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = UpdateResult<Vec<Row>>> + Send;

    /// Prepare `sql` with explicit parameter types, execute it and return the number of
    /// affected rows.
    ///
    /// `types` is positional; `Type::UNKNOWN` leaves the type of that parameter to the server.
    fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> impl std::future::Future<Output = UpdateResult<u64>> + Send;

    /// Whether the client can currently run statements.
    ///
    /// The default implementation returns `true`.
    fn is_ready(&self) -> bool {
        true
    }

    /// Resolve a table in the catalog and return its columns in ordinal order.
    ///
    /// Returns `Ok(None)` when no matching relation exists. The default implementation
    /// queries `pg_catalog` through [`GenericClient::query`].
    fn table_columns(
        &self,
        lookup: &TableLookup,
    ) -> impl std::future::Future<Output = UpdateResult<Option<ResolvedTable>>> + Send {
        catalog::load_table_columns(self, lookup)
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> UpdateResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(UpdateError::from_db_error)
    }

    async fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> UpdateResult<u64> {
        let stmt = tokio_postgres::Client::prepare_typed(self, sql, types)
            .await
            .map_err(UpdateError::from_db_error)?;
        tokio_postgres::Client::execute(self, &stmt, params)
            .await
            .map_err(UpdateError::from_db_error)
    }

    fn is_ready(&self) -> bool {
        !tokio_postgres::Client::is_closed(self)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> UpdateResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(UpdateError::from_db_error)
    }

    async fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> UpdateResult<u64> {
        let stmt = tokio_postgres::Transaction::prepare_typed(self, sql, types)
            .await
            .map_err(UpdateError::from_db_error)?;
        tokio_postgres::Transaction::execute(self, &stmt, params)
            .await
            .map_err(UpdateError::from_db_error)
    }
}

// ===== deadpool-postgres support =====
// Pooled clients go through `prepare_typed_cached`, so a compiled update is
// prepared once per physical connection.

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> UpdateResult<Vec<Row>> {
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> UpdateResult<u64> {
        GenericClient::execute_typed(&**self, sql, params, types).await
    }

    fn is_ready(&self) -> bool {
        GenericClient::is_ready(&**self)
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> UpdateResult<Vec<Row>> {
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> UpdateResult<u64> {
        let stmt = deadpool_postgres::ClientWrapper::prepare_typed_cached(self, sql, types)
            .await
            .map_err(UpdateError::from_db_error)?;
        tokio_postgres::Client::execute(self, &stmt, params)
            .await
            .map_err(UpdateError::from_db_error)
    }

    fn is_ready(&self) -> bool {
        GenericClient::is_ready(&**self)
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> UpdateResult<Vec<Row>> {
        GenericClient::query(&**self, sql, params).await
    }

    async fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> UpdateResult<u64> {
        let stmt = deadpool_postgres::Transaction::prepare_typed_cached(self, sql, types)
            .await
            .map_err(UpdateError::from_db_error)?;
        tokio_postgres::Transaction::execute(self, &stmt, params)
            .await
            .map_err(UpdateError::from_db_error)
    }
}

// ===== Reference implementation =====
// Lets a shared `&Client` be handed to APIs that take the client by value.

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> UpdateResult<Vec<Row>> {
        (*self).query(sql, params).await
    }

    fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> impl std::future::Future<Output = UpdateResult<u64>> + Send {
        (*self).execute_typed(sql, params, types)
    }

    fn is_ready(&self) -> bool {
        (*self).is_ready()
    }

    fn table_columns(
        &self,
        lookup: &TableLookup,
    ) -> impl std::future::Future<Output = UpdateResult<Option<ResolvedTable>>> + Send {
        (*self).table_columns(lookup)
    }
}
