use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use super::config::SqliteOptions;
use super::params::Params;
use super::query::build_result_set;
use crate::command::DbCommand;
use crate::config::FetchSize;
use crate::error::SqlMapperError;
use crate::executor::DbConnection;
use crate::results::ResultSet;
use crate::types::CursorHandle;

pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// A single `rusqlite` connection. Statements run on the blocking pool.
pub struct SqliteConnection {
    conn: SharedSqliteConnection,
    in_transaction: bool,
    /// An abandoned transaction is rolled back by the next call.
    abandoned: bool,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            in_transaction: false,
            abandoned: false,
        }
    }

    /// Open the database described by `opts`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SqliteError` if opening or the journal pragma fails.
    pub async fn open(opts: SqliteOptions) -> Result<Self, SqlMapperError> {
        let wal = opts.wal && !opts.is_in_memory();
        let conn = spawn_blocking(move || -> Result<rusqlite::Connection, SqlMapperError> {
            let conn = rusqlite::Connection::open(&opts.db_path)?;
            if wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            Ok(conn)
        })
        .await
        .map_err(join_error)??;
        Ok(Self::new(conn))
    }

    /// # Errors
    /// Returns `SqlMapperError::SqliteError` if the database cannot be created.
    pub fn open_in_memory() -> Result<Self, SqlMapperError> {
        Ok(Self::new(rusqlite::Connection::open_in_memory()?))
    }

    /// Execute a batch of statements without parameters.
    ///
    /// # Errors
    /// Returns `SqlMapperError::SqliteError` on the first failing statement.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlMapperError> {
        let sql_owned = sql.to_owned();
        run_blocking(self.conn_handle(), move |guard| {
            guard.execute_batch(&sql_owned)?;
            Ok(())
        })
        .await
    }

    /// Run synchronous `rusqlite` logic against the underlying connection.
    ///
    /// # Errors
    /// Returns whatever `func` returns.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, SqlMapperError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlMapperError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.conn_handle(), func).await
    }

    fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&self.conn)
    }

    async fn control(&mut self, sql: &'static str, in_transaction: bool) -> Result<(), SqlMapperError> {
        debug!(statement = sql, "sqlite transaction control");
        self.execute_batch(sql).await?;
        self.in_transaction = in_transaction;
        Ok(())
    }

    async fn settle(&mut self) -> Result<(), SqlMapperError> {
        if self.abandoned {
            self.abandoned = false;
            warn!("rolling back abandoned transaction");
            self.control("ROLLBACK", false).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

fn join_error(e: tokio::task::JoinError) -> SqlMapperError {
    SqlMapperError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
}

async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, SqlMapperError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlMapperError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(join_error)?
}

fn no_cursors() -> SqlMapperError {
    SqlMapperError::Unimplemented("SQLite has no server-side cursors".to_string())
}

#[async_trait]
impl DbConnection for SqliteConnection {
    fn driver_name(&self) -> &'static str {
        "rusqlite"
    }

    async fn query(&mut self, cmd: &DbCommand) -> Result<ResultSet, SqlMapperError> {
        self.settle().await?;
        let sql_owned = cmd.sql.clone();
        let params = Params::from_command(cmd);
        run_blocking(self.conn_handle(), move |guard| {
            let mut stmt = guard.prepare(&sql_owned)?;
            build_result_set(&mut stmt, &params)
        })
        .await
    }

    async fn execute(&mut self, cmd: &DbCommand) -> Result<usize, SqlMapperError> {
        self.settle().await?;
        let sql_owned = cmd.sql.clone();
        let params = Params::from_command(cmd);
        run_blocking(self.conn_handle(), move |guard| {
            let mut stmt = guard.prepare(&sql_owned)?;
            params.bind(&mut stmt)?;
            Ok(stmt.raw_execute()?)
        })
        .await
    }

    async fn fetch_cursor(
        &mut self,
        _cursor: &CursorHandle,
        _size: FetchSize,
    ) -> Result<ResultSet, SqlMapperError> {
        Err(no_cursors())
    }

    async fn close_cursor(&mut self, _cursor: &CursorHandle) -> Result<(), SqlMapperError> {
        Err(no_cursors())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction && !self.abandoned
    }

    fn abandon_transaction(&mut self) {
        self.abandoned = self.in_transaction;
    }

    async fn begin(&mut self) -> Result<(), SqlMapperError> {
        self.settle().await?;
        if self.in_transaction {
            return Err(SqlMapperError::ExecutionError(
                "SQLite transaction already in progress".into(),
            ));
        }
        self.control("BEGIN", true).await
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.settle().await?;
        if !self.in_transaction {
            return Err(SqlMapperError::ExecutionError(
                "SQLite transaction not active".into(),
            ));
        }
        self.control("COMMIT", false).await
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.abandoned = false;
        if !self.in_transaction {
            return Err(SqlMapperError::ExecutionError(
                "SQLite transaction not active".into(),
            ));
        }
        self.control("ROLLBACK", false).await
    }
}
