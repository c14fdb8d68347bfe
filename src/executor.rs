//! The driver seam: everything the caches, paging and cursor reader need from a
//! live connection.

use async_trait::async_trait;

use crate::command::DbCommand;
use crate::config::FetchSize;
use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::CursorHandle;

#[async_trait]
pub trait DbConnection: Send {
    /// Identity of the driver behind this connection; part of table-metadata keys.
    fn driver_name(&self) -> &'static str;

    /// Execute `cmd` and return its rows. Cursor-valued columns come back as
    /// `RowValues::Cursor` and their native type names in the column types.
    async fn query(&mut self, cmd: &DbCommand) -> Result<ResultSet, SqlMapperError>;

    /// Execute a statement that returns no rows; yields the affected row count.
    async fn execute(&mut self, cmd: &DbCommand) -> Result<usize, SqlMapperError>;

    /// Fetch the next batch of rows from an open cursor.
    async fn fetch_cursor(
        &mut self,
        cursor: &CursorHandle,
        size: FetchSize,
    ) -> Result<ResultSet, SqlMapperError>;

    async fn close_cursor(&mut self, cursor: &CursorHandle) -> Result<(), SqlMapperError>;

    /// Whether a transaction is open. False once the transaction has been
    /// abandoned, since the next call rolls it back.
    fn in_transaction(&self) -> bool;

    /// Give up on the open transaction without awaiting. The next call on this
    /// connection rolls it back before doing anything else.
    fn abandon_transaction(&mut self);

    async fn begin(&mut self) -> Result<(), SqlMapperError>;

    async fn commit(&mut self) -> Result<(), SqlMapperError>;

    async fn rollback(&mut self) -> Result<(), SqlMapperError>;
}
