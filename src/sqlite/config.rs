use super::connection::SqliteConnection;
use crate::error::SqlMapperError;

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// File path, or `:memory:`.
    pub db_path: String,
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            wal: true,
        }
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.db_path == ":memory:"
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    /// Switch the journal to WAL on open (ignored for in-memory databases).
    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the connection.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SqliteError` if the database cannot be opened.
    pub async fn build(self) -> Result<SqliteConnection, SqlMapperError> {
        SqliteConnection::open(self.finish()).await
    }
}
