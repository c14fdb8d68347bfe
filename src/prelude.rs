//! Convenient imports for common functionality.

pub use crate::command::{CommandKind, DbCommand, DbParameter, ParamType, ParameterDirection};
pub use crate::config::{DefaultValueMode, FetchSize, MapperConfig, MapperConfigBuilder};
pub use crate::contract::{
    DataContract, DataContractStore, Direction, FieldValue, NamingPolicy, RecordShape,
    ShapeBuilder, Visibility,
};
pub use crate::cursor::{CursorBatch, CursorReader, DereferenceOptions, dereference};
pub use crate::dialect::{
    Dialect, DialectRef, PagingQueryPair, PagingStrategy, SelectSpec, dialect_for,
};
pub use crate::error::SqlMapperError;
pub use crate::executor::DbConnection;
pub use crate::metadata::{ColumnMetadata, TableMetadataStore};
pub use crate::paging::{PagedResults, fetch_page, fetch_page_as};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{CursorHandle, DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresConnection;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteOptions, SqliteOptionsBuilder};
