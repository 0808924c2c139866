//! Error types for pgupdate

use thiserror::Error;

/// Result type alias for pgupdate operations
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Error types for compiling and executing updates
#[derive(Debug, Error)]
pub enum UpdateError {
    /// No table name was configured before compilation
    #[error("Table name is required")]
    MissingTableName,

    /// A configuration setter was called after compilation
    #[error("Configuration can't be altered once the update has been compiled or used")]
    ConfigurationLocked,

    /// Catalog introspection failed; compilation is aborted
    #[error("Metadata access error: {0}")]
    MetadataAccess(String),

    /// Client is not usable (closed connection, bad URL, ...)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error
    #[error("Execution error: {0}")]
    Execution(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Invalid configuration or identifier
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl UpdateError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a metadata access error
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::MetadataAccess(message.into())
    }

    /// Check if this error comes from a setter called after compilation
    pub fn is_configuration_locked(&self) -> bool {
        matches!(self, Self::ConfigurationLocked)
    }

    /// Check if this error aborted catalog introspection
    pub fn is_metadata_access(&self) -> bool {
        matches!(self, Self::MetadataAccess(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Parse a tokio_postgres error into a more specific UpdateError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Execution(err)
    }

    /// Wrap any error raised while reading the catalog.
    ///
    /// Configuration errors pass through untouched so callers can still match on them.
    pub(crate) fn into_metadata(self) -> Self {
        match self {
            Self::MetadataAccess(_)
            | Self::MissingTableName
            | Self::ConfigurationLocked
            | Self::Validation(_) => self,
            other => Self::MetadataAccess(other.to_string()),
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for UpdateError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
