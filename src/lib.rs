//! Dialect-aware SQL generation, cached data contracts and table metadata, and
//! server-side cursor dereferencing over a small async connection trait.
//!
//! ## Modules
//!
//! - [`dialect`]: one [`dialect::Dialect`] per backend family (SQL Server, MySQL,
//!   Oracle, PostgreSQL, SQLite) with paging, parameter naming and catalog queries
//! - [`contract`]: record shapes and the [`contract::DataContractStore`]
//! - [`metadata`]: catalog column metadata and the [`metadata::TableMetadataStore`]
//! - [`cursor`]: [`cursor::dereference`] and the [`cursor::CursorReader`]
//! - [`paging`]: count-and-page helpers
//!
//! Drivers live behind the `postgres` and `sqlite` features.

pub mod cache;
pub mod command;
pub mod config;
pub mod contract;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod paging;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
mod test_utils;

pub use error::SqlMapperError;
pub use executor::DbConnection;
pub use results::{CustomDbRow, ResultSet};
pub use types::{CursorHandle, DatabaseType, RowValues};
