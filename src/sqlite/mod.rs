//! SQLite driver on `rusqlite`.
//!
//! - config: open options and builder
//! - params: `RowValues` to SQLite values, bound by name or position
//! - query: result extraction
//! - connection: the `DbConnection` implementation

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use params::Params;
pub use query::build_result_set;
