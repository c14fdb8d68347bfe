//! Scripted in-memory connection for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::DbCommand;
use crate::config::FetchSize;
use crate::error::SqlMapperError;
use crate::executor::DbConnection;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::{CursorHandle, RowValues};

pub(crate) fn create_test_row(column_names: &[&str], values: Vec<RowValues>) -> CustomDbRow {
    let names = column_names.iter().map(|c| (*c).to_string()).collect();
    CustomDbRow::new(Arc::new(names), values)
}

pub(crate) fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    ResultSet::from_rows(columns.iter().map(|c| (*c).to_string()).collect(), rows)
}

#[derive(Default)]
pub(crate) struct FakeConnection {
    /// Results keyed by exact SQL text.
    pub(crate) fixtures: HashMap<String, ResultSet>,
    /// Remaining rows of each open cursor.
    pub(crate) cursors: HashMap<String, VecDeque<Vec<RowValues>>>,
    pub(crate) cursor_columns: Vec<String>,
    pub(crate) fetch_delay: Option<Duration>,
    pub(crate) log: Vec<String>,
    pub(crate) executed: Vec<DbCommand>,
    pub(crate) in_tx: bool,
    pub(crate) abandoned: bool,
}

impl FakeConnection {
    pub(crate) fn with_fixture(mut self, sql: &str, rows: ResultSet) -> Self {
        self.fixtures.insert(sql.to_string(), rows);
        self
    }

    pub(crate) fn with_cursor(mut self, name: &str, rows: Vec<Vec<RowValues>>) -> Self {
        self.cursors.insert(name.to_string(), rows.into());
        self
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.log.iter().filter(|l| l.starts_with(prefix)).count()
    }

    fn settle(&mut self) {
        if self.abandoned {
            self.abandoned = false;
            self.log.push("rollback".to_string());
            self.in_tx = false;
        }
    }
}

#[async_trait]
impl DbConnection for FakeConnection {
    fn driver_name(&self) -> &'static str {
        "fake"
    }

    async fn query(&mut self, cmd: &DbCommand) -> Result<ResultSet, SqlMapperError> {
        self.settle();
        self.log.push(format!("query {}", cmd.sql));
        self.executed.push(cmd.clone());
        self.fixtures
            .get(&cmd.sql)
            .cloned()
            .ok_or_else(|| SqlMapperError::ExecutionError(format!("no fixture for {}", cmd.sql)))
    }

    async fn execute(&mut self, cmd: &DbCommand) -> Result<usize, SqlMapperError> {
        self.settle();
        self.log.push(format!("execute {}", cmd.sql));
        self.executed.push(cmd.clone());
        Ok(0)
    }

    async fn fetch_cursor(
        &mut self,
        cursor: &CursorHandle,
        size: FetchSize,
    ) -> Result<ResultSet, SqlMapperError> {
        self.settle();
        self.log.push(format!("fetch {cursor}"));
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let rows = self.cursors.get_mut(cursor.name()).ok_or_else(|| {
            SqlMapperError::ExecutionError(format!("cursor {cursor} is not open"))
        })?;
        let take = match size {
            FetchSize::Rows(n) => rows.len().min(n.get() as usize),
            FetchSize::All => rows.len(),
        };
        let batch: Vec<_> = rows.drain(..take).collect();
        Ok(ResultSet::from_rows(self.cursor_columns.clone(), batch))
    }

    async fn close_cursor(&mut self, cursor: &CursorHandle) -> Result<(), SqlMapperError> {
        self.settle();
        self.log.push(format!("close {cursor}"));
        self.cursors.remove(cursor.name());
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx && !self.abandoned
    }

    fn abandon_transaction(&mut self) {
        self.abandoned = self.in_tx;
    }

    async fn begin(&mut self) -> Result<(), SqlMapperError> {
        self.settle();
        self.log.push("begin".to_string());
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.settle();
        self.log.push("commit".to_string());
        self.in_tx = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.abandoned = false;
        self.log.push("rollback".to_string());
        self.in_tx = false;
        Ok(())
    }
}
