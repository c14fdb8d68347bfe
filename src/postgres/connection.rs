use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use super::params::Params;
use super::query::build_result_set;
use crate::command::DbCommand;
use crate::config::FetchSize;
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::SqlMapperError;
use crate::executor::DbConnection;
use crate::results::ResultSet;
use crate::types::CursorHandle;

/// A single `tokio-postgres` client.
///
/// Transactions are driven with plain `BEGIN`/`COMMIT`/`ROLLBACK` so the cursor
/// reader can hold the connection across fetches.
pub struct PostgresConnection {
    client: Client,
    in_tx: bool,
    /// An abandoned transaction is rolled back by the next call.
    abandoned: bool,
}

impl PostgresConnection {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            in_tx: false,
            abandoned: false,
        }
    }

    /// Connect without TLS and drive the connection on a background task.
    ///
    /// # Errors
    /// Returns the driver's error if the connection cannot be established.
    pub async fn connect(connection_string: &str) -> Result<Self, SqlMapperError> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection closed with error");
            }
        });
        Ok(Self::new(client))
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn control(&mut self, sql: &str, in_tx: bool) -> Result<(), SqlMapperError> {
        debug!(statement = sql, "postgres transaction control");
        self.client.batch_execute(sql).await?;
        self.in_tx = in_tx;
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

fn dialect_sql(sql: Option<String>, what: &str) -> Result<String, SqlMapperError> {
    sql.ok_or_else(|| SqlMapperError::Unimplemented(format!("postgres {what}")))
}

#[async_trait]
impl DbConnection for PostgresConnection {
    fn driver_name(&self) -> &'static str {
        "tokio-postgres"
    }

    async fn query(&mut self, cmd: &DbCommand) -> Result<ResultSet, SqlMapperError> {
        self.settle().await?;
        let stmt = self.client.prepare(&cmd.sql).await?;
        let params = Params::from_command(cmd);
        let rows = self.client.query(&stmt, params.as_refs()).await?;
        build_result_set(&stmt, &rows)
    }

    async fn execute(&mut self, cmd: &DbCommand) -> Result<usize, SqlMapperError> {
        self.settle().await?;
        let params = Params::from_command(cmd);
        let rows = self.client.execute(cmd.sql.as_str(), params.as_refs()).await?;
        usize::try_from(rows).map_err(|e| {
            SqlMapperError::ExecutionError(format!("postgres affected rows conversion error: {e}"))
        })
    }

    async fn fetch_cursor(
        &mut self,
        cursor: &CursorHandle,
        size: FetchSize,
    ) -> Result<ResultSet, SqlMapperError> {
        self.settle().await?;
        let sql = dialect_sql(PostgresDialect.build_cursor_fetch(cursor, size), "cursor fetch")?;
        let stmt = self.client.prepare(&sql).await?;
        let rows = self.client.query(&stmt, &[]).await?;
        build_result_set(&stmt, &rows)
    }

    async fn close_cursor(&mut self, cursor: &CursorHandle) -> Result<(), SqlMapperError> {
        self.settle().await?;
        let sql = dialect_sql(PostgresDialect.build_cursor_close(cursor), "cursor close")?;
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx && !self.abandoned
    }

    fn abandon_transaction(&mut self) {
        self.abandoned = self.in_tx;
    }

    async fn begin(&mut self) -> Result<(), SqlMapperError> {
        self.settle().await?;
        self.control("BEGIN", true).await
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.settle().await?;
        self.control("COMMIT", false).await
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.abandoned = false;
        self.control("ROLLBACK", false).await
    }
}
