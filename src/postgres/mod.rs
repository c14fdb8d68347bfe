//! PostgreSQL driver on `tokio-postgres`.
//!
//! - params: `RowValues` to `ToSql`, bound positionally
//! - query: result extraction, refcursor columns surface as cursor handles
//! - connection: the `DbConnection` implementation

pub mod connection;
pub mod params;
pub mod query;

pub use connection::PostgresConnection;
pub use params::Params;
pub use query::build_result_set;
