use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    /// `*` combined with a join cannot be paged with windowed-rank paging.
    #[error(
        "Cannot use '*' as the column list when selecting from a join ({table}); list the columns explicitly"
    )]
    StarWithJoin { table: String },

    #[error("Cannot complete paged select operation, you must provide an ORDER BY value")]
    MissingOrderBy,

    #[error("Column resolution error: {0}")]
    ColumnResolution(String),

    #[error(
        "Dynamic record shapes have no fields to map, so column naming overrides are not allowed ({0})"
    )]
    DynamicShapeOverride(String),

    #[error("Cannot interpret default value {literal:?} for column {column}")]
    UnknownDefaultValue { column: String, literal: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data contract violation: {0}")]
    ContractViolation(String),

    #[error("No table metadata found for {table}")]
    TableMetadataNotFound { table: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlMapperError {
    /// True when the operation stopped because its cancellation token fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SqlMapperError::Cancelled)
    }

    /// True for malformed or ambiguous caller input. These are raised before any
    /// backend round trip and are never cached.
    #[must_use]
    pub fn is_caller_input(&self) -> bool {
        matches!(
            self,
            SqlMapperError::StarWithJoin { .. }
                | SqlMapperError::MissingOrderBy
                | SqlMapperError::ColumnResolution(_)
                | SqlMapperError::DynamicShapeOverride(_)
                | SqlMapperError::UnknownDefaultValue { .. }
                | SqlMapperError::InvalidInput(_)
        )
    }
}
