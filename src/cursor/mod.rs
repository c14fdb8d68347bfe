//! Cursor dereferencing: results whose columns hold server-side cursor handles are
//! re-presented as the rows behind those cursors.

mod reader;

pub use reader::{CursorBatch, CursorReader};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::DbCommand;
use crate::config::{FetchSize, MapperConfig};
use crate::dialect::Dialect;
use crate::error::SqlMapperError;
use crate::executor::DbConnection;

/// Per-call settings for [`dereference`].
#[derive(Debug, Clone, Default)]
pub struct DereferenceOptions {
    pub fetch_size: FetchSize,
    /// When false, results are returned as-is, cursor handles included.
    pub enabled: bool,
    pub cancel: CancellationToken,
}

impl DereferenceOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_config(config: &MapperConfig) -> Self {
        Self {
            fetch_size: config.fetch_size,
            enabled: config.auto_dereference_cursors,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn fetch_size(mut self, fetch_size: FetchSize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    #[must_use]
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Run `cmd` and return a reader over its rows, with any cursors it returns
/// dereferenced.
///
/// When the dialect needs cursor fetches inside the creating transaction, the
/// placeholder cursor parameters are removed from `cmd` and, if `conn` is not
/// already in a transaction, one is opened and handed to the reader. That
/// transaction ends when the reader is exhausted or closed; dropping the reader
/// earlier leaves it to be rolled back by the connection's next call.
///
/// # Errors
/// Returns the driver's error if the command fails (rolling back any transaction
/// opened here), or `SqlMapperError::Cancelled` if the token fires first.
pub async fn dereference<'c, C>(
    conn: &'c mut C,
    dialect: &dyn Dialect,
    mut cmd: DbCommand,
    options: DereferenceOptions,
) -> Result<CursorReader<'c, C>, SqlMapperError>
where
    C: DbConnection + ?Sized,
{
    let needs_transaction = options.enabled && dialect.requires_wrapping_transaction(&cmd);
    let opens_transaction = needs_transaction && !conn.in_transaction();
    if needs_transaction {
        let stripped = cmd.strip_cursor_params();
        debug!(stripped = stripped.len(), "removed cursor placeholder parameters");
    }
    if opens_transaction {
        debug!("opening wrapping transaction for cursor fetches");
        conn.begin().await?;
    }

    let outcome = {
        let query = conn.query(&cmd);
        tokio::select! {
            biased;
            () = options.cancel.cancelled() => None,
            result = query => Some(result),
        }
    };
    let source = match outcome {
        Some(Ok(source)) => source,
        failed => {
            if opens_transaction {
                conn.rollback().await?;
            }
            return match failed {
                Some(Err(err)) => Err(err),
                _ => Err(SqlMapperError::Cancelled),
            };
        }
    };

    if !options.enabled {
        return Ok(CursorReader::pass_through(conn, source, options.cancel));
    }
    Ok(
        CursorReader::new(conn, dialect, source, options.fetch_size, options.cancel)
            .owning_transaction(opens_transaction),
    )
}
