use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::FetchSize;
use crate::dialect::{CursorSupport, Dialect};
use crate::error::SqlMapperError;
use crate::executor::DbConnection;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::{CursorHandle, RowValues};

/// Rows from one fetch.
#[derive(Debug, Clone)]
pub struct CursorBatch {
    /// Position of the cursor among those found in the source rows.
    pub cursor_index: usize,
    pub rows: ResultSet,
    /// The cursor is exhausted and has been closed.
    pub is_last: bool,
}

#[derive(Debug)]
enum ReaderState {
    /// No cursors were found; the source rows are handed out once.
    PassThrough(Option<ResultSet>),
    Dereferencing,
    Exhausted,
}

#[derive(Debug)]
struct Pending {
    cursor_index: usize,
    is_last: bool,
    rows: std::vec::IntoIter<CustomDbRow>,
}

/// Turns cursor handles in a result into the rows behind them.
///
/// The reader owns the connection until it reaches its terminal state: every
/// cursor exhausted, an error, or cancellation. Cursors are read one after the
/// other in row order then column order, with at most one fetch outstanding. If
/// the reader opened a wrapping transaction it commits on completion and rolls
/// back on error or cancellation.
///
/// Read to the end or call [`CursorReader::close`]. A reader dropped earlier
/// cannot end its wrapping transaction itself: it abandons it, and the
/// connection rolls it back on its next call.
pub struct CursorReader<'c, C: DbConnection + ?Sized> {
    conn: &'c mut C,
    fetch_size: FetchSize,
    cancel: CancellationToken,
    state: ReaderState,
    cursors: VecDeque<CursorHandle>,
    next_index: usize,
    pending: Option<Pending>,
    owns_transaction: bool,
    rows_yielded: usize,
}

impl<C: DbConnection + ?Sized> std::fmt::Debug for CursorReader<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorReader")
            .field("state", &self.state)
            .field("cursors", &self.cursors)
            .field("fetch_size", &self.fetch_size)
            .field("owns_transaction", &self.owns_transaction)
            .finish_non_exhaustive()
    }
}

/// Column positions holding cursors: by native type tag when the driver reports
/// types, otherwise by the values of the first row.
fn cursor_columns(source: &ResultSet, dialect: &dyn Dialect) -> Vec<usize> {
    if dialect.capabilities().cursors == CursorSupport::Unsupported {
        return Vec::new();
    }
    if let Some(types) = source.get_column_types() {
        let tagged: Vec<usize> = types
            .iter()
            .enumerate()
            .filter(|(_, t)| dialect.is_cursor_type(t))
            .map(|(i, _)| i)
            .collect();
        if !tagged.is_empty() {
            return tagged;
        }
    }
    source.results.first().map_or_else(Vec::new, |row| {
        row.rows
            .iter()
            .enumerate()
            .filter(|(_, v)| matches!(v, RowValues::Cursor(_)))
            .map(|(i, _)| i)
            .collect()
    })
}

fn handles(source: &ResultSet, columns: &[usize]) -> VecDeque<CursorHandle> {
    let mut found = VecDeque::new();
    for row in &source.results {
        for &idx in columns {
            match row.get_by_index(idx) {
                Some(RowValues::Cursor(handle)) => found.push_back(handle.clone()),
                Some(RowValues::Text(name)) => found.push_back(CursorHandle::new(name.clone())),
                Some(RowValues::Null) | None => {}
                Some(other) => warn!(column = idx, kind = other.kind(), "ignoring non-cursor value in cursor column"),
            }
        }
    }
    found
}

impl<C: DbConnection + ?Sized> Drop for CursorReader<'_, C> {
    fn drop(&mut self) {
        if self.owns_transaction {
            warn!(
                remaining_cursors = self.cursors.len(),
                "cursor reader dropped before completion; abandoning its transaction"
            );
            self.conn.abandon_transaction();
        }
    }
}

impl<'c, C: DbConnection + ?Sized> CursorReader<'c, C> {
    /// Inspect `source` and prepare to read any cursors it carries.
    pub fn new(
        conn: &'c mut C,
        dialect: &dyn Dialect,
        source: ResultSet,
        fetch_size: FetchSize,
        cancel: CancellationToken,
    ) -> Self {
        let columns = cursor_columns(&source, dialect);
        let (state, cursors) = if columns.is_empty() {
            (ReaderState::PassThrough(Some(source)), VecDeque::new())
        } else {
            let cursors = handles(&source, &columns);
            debug!(
                cursor_columns = columns.len(),
                cursors = cursors.len(),
                ?fetch_size,
                "dereferencing cursors"
            );
            (ReaderState::Dereferencing, cursors)
        };
        Self {
            conn,
            fetch_size,
            cancel,
            state,
            cursors,
            next_index: 0,
            pending: None,
            owns_transaction: false,
            rows_yielded: 0,
        }
    }

    /// A reader that hands `source` out unchanged, cursor handles included.
    pub fn pass_through(conn: &'c mut C, source: ResultSet, cancel: CancellationToken) -> Self {
        Self {
            conn,
            fetch_size: FetchSize::All,
            cancel,
            state: ReaderState::PassThrough(Some(source)),
            cursors: VecDeque::new(),
            next_index: 0,
            pending: None,
            owns_transaction: false,
            rows_yielded: 0,
        }
    }

    /// Hand over a transaction the reader must end when it reaches a terminal state.
    #[must_use]
    pub(crate) fn owning_transaction(mut self, owns: bool) -> Self {
        self.owns_transaction = owns;
        self
    }

    /// True when the source carried no cursors.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        matches!(self.state, ReaderState::PassThrough(_))
    }

    /// Cursors not yet exhausted.
    #[must_use]
    pub fn remaining_cursors(&self) -> usize {
        self.cursors.len()
    }

    /// Rows handed to the caller so far.
    #[must_use]
    pub fn rows_yielded(&self) -> usize {
        self.rows_yielded
    }

    /// The next batch of rows.
    ///
    /// With a fetch size of `n`, each cursor yields batches of `n` rows until a
    /// shorter (possibly empty) batch marks it exhausted.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Cancelled` if the token fires before or during a
    /// fetch; driver errors are returned unchanged. Either way the open cursors are
    /// closed and the reader is finished.
    pub async fn next_batch(&mut self) -> Result<Option<CursorBatch>, SqlMapperError> {
        if self.cancel.is_cancelled() && !self.is_finished() {
            return Err(self.abort().await);
        }
        if let Some(pending) = self.pending.take() {
            let mut rows = ResultSet::default();
            for row in pending.rows {
                rows.add_row(row);
            }
            if !rows.is_empty() || pending.is_last {
                self.rows_yielded += rows.len();
                return Ok(Some(CursorBatch {
                    cursor_index: pending.cursor_index,
                    rows,
                    is_last: pending.is_last,
                }));
            }
        }
        self.fetch_batch().await.map(|batch| {
            if let Some(batch) = &batch {
                self.rows_yielded += batch.rows.len();
            }
            batch
        })
    }

    /// The next row and the index of the cursor it came from. Pass-through rows
    /// report index 0.
    ///
    /// # Errors
    /// See [`CursorReader::next_batch`]. Cancellation is checked before every row.
    pub async fn next_row(&mut self) -> Result<Option<(usize, CustomDbRow)>, SqlMapperError> {
        loop {
            if self.cancel.is_cancelled() && !self.is_finished() {
                return Err(self.abort().await);
            }
            if let Some(pending) = &mut self.pending {
                if let Some(row) = pending.rows.next() {
                    self.rows_yielded += 1;
                    return Ok(Some((pending.cursor_index, row)));
                }
                self.pending = None;
            }
            match self.fetch_batch().await? {
                Some(batch) => {
                    self.pending = Some(Pending {
                        cursor_index: batch.cursor_index,
                        is_last: batch.is_last,
                        rows: batch.rows.results.into_iter(),
                    });
                }
                None => return Ok(None),
            }
        }
    }

    /// Every row of the next cursor (or the source rows when passing through).
    ///
    /// # Errors
    /// See [`CursorReader::next_batch`].
    pub async fn next_result(&mut self) -> Result<Option<ResultSet>, SqlMapperError> {
        let Some(first) = self.next_batch().await? else {
            return Ok(None);
        };
        let mut rows = first.rows;
        let mut is_last = first.is_last;
        while !is_last {
            match self.next_batch().await? {
                Some(batch) => {
                    is_last = batch.is_last;
                    rows.extend(batch.rows);
                }
                None => break,
            }
        }
        Ok(Some(rows))
    }

    /// Read everything: one result per cursor, or the source rows.
    ///
    /// # Errors
    /// See [`CursorReader::next_batch`].
    pub async fn collect(mut self) -> Result<Vec<ResultSet>, SqlMapperError> {
        let mut results = Vec::new();
        while let Some(result) = self.next_result().await? {
            results.push(result);
        }
        Ok(results)
    }

    /// Stop early: close the remaining cursors and commit a wrapping transaction.
    ///
    /// # Errors
    /// Returns the driver's error if the commit fails.
    pub async fn close(mut self) -> Result<(), SqlMapperError> {
        self.pending = None;
        self.close_remaining().await;
        self.finish().await
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, ReaderState::Exhausted)
            && self.pending.as_ref().is_none_or(|p| p.rows.len() == 0)
    }

    async fn fetch_batch(&mut self) -> Result<Option<CursorBatch>, SqlMapperError> {
        match &mut self.state {
            ReaderState::Exhausted => Ok(None),
            ReaderState::PassThrough(source) => {
                let rows = source.take().unwrap_or_default();
                self.finish().await?;
                Ok(Some(CursorBatch {
                    cursor_index: 0,
                    rows,
                    is_last: true,
                }))
            }
            ReaderState::Dereferencing => self.fetch_cursor_batch().await,
        }
    }

    async fn fetch_cursor_batch(&mut self) -> Result<Option<CursorBatch>, SqlMapperError> {
        if self.cancel.is_cancelled() {
            return Err(self.abort().await);
        }
        let Some(handle) = self.cursors.front().cloned() else {
            self.finish().await?;
            return Ok(None);
        };
        let size = self.fetch_size;
        trace!(cursor = %handle, ?size, "fetching cursor batch");

        let outcome = {
            let fetch = self.conn.fetch_cursor(&handle, size);
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                result = fetch => Some(result),
            }
        };
        let rows = match outcome {
            None => return Err(self.abort().await),
            Some(Err(err)) => {
                self.fail().await;
                return Err(err);
            }
            Some(Ok(rows)) => rows,
        };

        let cursor_index = self.next_index;
        let is_last = size.is_exhausted_by(rows.len());
        if is_last {
            self.cursors.pop_front();
            self.next_index += 1;
            trace!(cursor = %handle, "cursor exhausted");
            if let Err(err) = self.conn.close_cursor(&handle).await {
                self.fail().await;
                return Err(err);
            }
        }
        Ok(Some(CursorBatch {
            cursor_index,
            rows,
            is_last,
        }))
    }

    async fn close_remaining(&mut self) {
        while let Some(handle) = self.cursors.pop_front() {
            if let Err(err) = self.conn.close_cursor(&handle).await {
                warn!(cursor = %handle, error = %err, "failed to close cursor");
            }
        }
    }

    async fn finish(&mut self) -> Result<(), SqlMapperError> {
        self.state = ReaderState::Exhausted;
        if self.owns_transaction {
            self.owns_transaction = false;
            debug!("committing wrapping transaction");
            self.conn.commit().await?;
        }
        Ok(())
    }

    async fn rollback_owned(&mut self) {
        self.state = ReaderState::Exhausted;
        self.pending = None;
        if self.owns_transaction {
            self.owns_transaction = false;
            debug!("rolling back wrapping transaction");
            if let Err(err) = self.conn.rollback().await {
                warn!(error = %err, "failed to roll back wrapping transaction");
            }
        }
    }

    async fn fail(&mut self) {
        self.close_remaining().await;
        self.rollback_owned().await;
    }

    async fn abort(&mut self) -> SqlMapperError {
        debug!(rows = self.rows_yielded, "cursor dereferencing cancelled");
        self.fail().await;
        SqlMapperError::Cancelled
    }
}
