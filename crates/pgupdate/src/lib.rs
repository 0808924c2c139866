//! # pgupdate
//!
//! Metadata-driven, compile-once UPDATE statements for PostgreSQL.
//!
//! ## Features
//!
//! - **Metadata-driven**: column list and parameter types come from `pg_catalog`
//! - **Compile once**: SQL and type vector are built on first use and cached
//! - **Forgiving binding**: values match columns by name across naming conventions
//! - **Transaction-friendly**: pass a transaction anywhere a `GenericClient` is expected
//! - **Safe identifiers**: configured names are validated before they reach SQL
//!
//! ## Example
//!
//! ```ignore
//! use pgupdate::{MapParameterSource, Operator, SimpleUpdate};
//!
//! let update = SimpleUpdate::new(&client)
//!     .with_table_name("dummy_table")?
//!     .updating_columns(["a_string", "an_int", "a_bool"])?
//!     .restricting_columns_with([("key_1", Operator::Equals), ("key_2", Operator::LessThan)])?;
//!
//! // UPDATE dummy_table SET a_string = $1, an_int = $2, a_bool = $3 WHERE key_1 = $4 AND key_2 < $5
//! let affected = update
//!     .execute_source(
//!         &MapParameterSource::new()
//!             .add_value("aString", "Hello")
//!             .add_value("anInt", 42)
//!             .add_value("aBool", true),
//!         &MapParameterSource::new()
//!             .add_value("key_1", "Pwet")
//!             .add_value("key_2", 3),
//!     )
//!     .await?;
//! ```

pub mod client;
pub mod error;
pub mod ident;
pub mod metadata;
pub mod row;
pub mod source;
pub mod update;
pub mod value;

pub mod prelude;

pub use client::GenericClient;
pub use error::{UpdateError, UpdateResult};
pub use ident::{Ident, IdentPart};
pub use metadata::{
    ColumnMetadata, GeneratedKeySupport, MetadataOptions, RelationKind, ResolvedTable,
    TableLookup, TableMetadataContext, TableMetadataProvider, TYPE_UNKNOWN,
};
pub use row::RowExt;
pub use source::{MapParameterSource, ParameterSource, SerdeParameterSource, TypedValue};
pub use update::{CompileHook, CompiledUpdate, Operator, SimpleUpdate, TracingCompileHook};
pub use value::SqlValue;

// Re-export so callers can name parameter types without depending on tokio-postgres directly.
pub use tokio_postgres::types::Type;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};
