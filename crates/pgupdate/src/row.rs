//! Row access helpers

use crate::error::{UpdateError, UpdateResult};
use tokio_postgres::Row;

/// Extension trait for Row to provide convenient column access
pub trait RowExt {
    /// Try to get a column value, returning UpdateError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> UpdateResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> UpdateResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| UpdateError::decode(column, e.to_string()))
    }
}
