//! Convenient imports for typical `pgupdate` usage.
//!
//! ```ignore
//! use pgupdate::prelude::*;
//! ```

pub use crate::{
    GenericClient, MapParameterSource, Operator, ParameterSource, SerdeParameterSource,
    SimpleUpdate, SqlValue, UpdateError, UpdateResult,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
