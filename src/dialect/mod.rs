//! Backend-specific SQL generation.
//!
//! Every backend family gets one [`Dialect`] implementation. Dialects are stateless:
//! the behaviour that differs between backends is either a method override or an
//! entry in the backend's [`DialectCapabilities`] table.

use std::fmt;
use std::sync::Arc;

use crate::command::{CommandKind, DbCommand, DbParameter, ParamType, ParameterDirection};
use crate::config::{DefaultValueMode, FetchSize};
use crate::error::SqlMapperError;
use crate::metadata::ColumnMetadata;
use crate::results::CustomDbRow;
use crate::types::{CursorHandle, DatabaseType, RowValues};

mod defaults;
mod fragments;
mod mysql;
mod oracle;
mod paging;
mod postgres;
mod sql_server;
mod sqlite;

pub use defaults::{KnownDefault, interpret_default_value};
pub use fragments::{is_join, order_by_body, order_by_fragment, qualify_star, where_fragment};
pub(crate) use fragments::limit_select;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use paging::{PagingQueryPair, build_limit_offset_pair, build_row_number_pair, page_offset};
pub use postgres::PostgresDialect;
pub use sql_server::SqlServerDialect;
pub use sqlite::SqliteDialect;

/// Pagination algorithm used by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStrategy {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `ROW_NUMBER() OVER (ORDER BY ...)` in a subquery, filtered by rank.
    RowNumber,
}

/// How a backend produces new primary key values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGeneration {
    /// Keys come from a named sequence fetched before (or during) the insert.
    Sequence,
    /// Keys are assigned by an identity/auto-increment column.
    Identity,
}

/// Parameter value/type fix-ups a backend needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterQuirk {
    /// Booleans are sent as 0/1 integers.
    BoolAsTinyInt,
    /// Strings up to `max` characters are declared with that size, longer ones as unbounded.
    SizedStrings { max: i32 },
    /// Cursor values and cursor placeholders are typed as the backend's cursor type.
    CursorType,
}

/// Server-side cursor behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorSupport {
    Unsupported,
    RefCursor {
        /// Native type names that identify a cursor-valued column.
        type_tags: &'static [&'static str],
        /// Cursors can only be fetched inside the transaction that opened them.
        fetch_in_transaction: bool,
    },
}

/// Static description of a backend, resolved at compile time per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    pub paging: PagingStrategy,
    pub key_generation: KeyGeneration,
    pub parameter_prefix: &'static str,
    /// Anonymous parameters are numbered from 1 instead of 0.
    pub one_based_parameters: bool,
    pub cursors: CursorSupport,
    pub quirks: &'static [ParameterQuirk],
    /// Rank column exposed by windowed-rank paging.
    pub rank_column: &'static str,
    pub known_defaults: &'static [(&'static str, KnownDefault)],
}

/// Inputs of a single SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectSpec<'a> {
    pub columns: &'a str,
    /// A table name or a join expression.
    pub table: &'a str,
    pub where_clause: Option<&'a str>,
    pub order_by: Option<&'a str>,
    pub limit: Option<u64>,
}

impl<'a> SelectSpec<'a> {
    #[must_use]
    pub fn new(table: &'a str) -> Self {
        Self {
            columns: "*",
            table,
            where_clause: None,
            order_by: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn columns(mut self, columns: &'a str) -> Self {
        self.columns = columns;
        self
    }

    #[must_use]
    pub fn filter(mut self, where_clause: &'a str) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: &'a str) -> Self {
        self.order_by = Some(order_by);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// SQL generation and parameter handling for one backend family.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    fn capabilities(&self) -> &'static DialectCapabilities;

    /// Build a single SELECT statement.
    ///
    /// # Errors
    /// Returns a caller-input error when the column list cannot be used with the table
    /// expression (see [`qualify_star`]).
    fn build_select(&self, spec: &SelectSpec<'_>) -> Result<String, SqlMapperError>;

    /// Build the row-count and page queries for one page.
    ///
    /// # Errors
    /// Returns `SqlMapperError::MissingOrderBy` when `spec.order_by` is empty and
    /// `SqlMapperError::InvalidInput` for a zero page size.
    fn build_paging_query_pair(
        &self,
        spec: &SelectSpec<'_>,
        page_size: u64,
        offset: u64,
    ) -> Result<PagingQueryPair, SqlMapperError> {
        let caps = self.capabilities();
        match caps.paging {
            PagingStrategy::LimitOffset => build_limit_offset_pair(spec, page_size, offset),
            PagingStrategy::RowNumber => {
                build_row_number_pair(spec, page_size, offset, caps.rank_column)
            }
        }
    }

    /// Catalog query listing the columns of `table`.
    fn build_table_metadata_query(&self, table: &str, owner: Option<&str>) -> DbCommand {
        let mut sql =
            "SELECT * FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = ".to_string();
        sql.push_str(&self.anonymous_parameter_name(0));
        let mut cmd = DbCommand::default();
        cmd.params.push(DbParameter::input(
            self.anonymous_parameter_name(0),
            RowValues::Text(table.to_string()),
        ));
        if let Some(owner) = owner {
            sql.push_str(" AND TABLE_SCHEMA = ");
            sql.push_str(&self.anonymous_parameter_name(1));
            cmd.params.push(DbParameter::input(
                self.anonymous_parameter_name(1),
                RowValues::Text(owner.to_string()),
            ));
        }
        sql.push_str(" ORDER BY ORDINAL_POSITION");
        cmd.sql = sql;
        cmd
    }

    /// Normalise one catalog row to the common column vocabulary.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` when the row has no column name.
    fn normalize_metadata_row(&self, row: &CustomDbRow) -> Result<ColumnMetadata, SqlMapperError> {
        ColumnMetadata::from_catalog_row(
            row,
            &CatalogFields {
                column_name: "COLUMN_NAME",
                data_type: "DATA_TYPE",
                default: "COLUMN_DEFAULT",
                numeric_scale: Some("NUMERIC_SCALE"),
                numeric_precision: Some("NUMERIC_PRECISION"),
                nullable: Some("IS_NULLABLE"),
            },
        )
    }

    fn prefix_parameter_name(&self, raw_name: &str) -> String {
        let prefix = self.capabilities().parameter_prefix;
        if raw_name.starts_with(prefix) {
            raw_name.to_string()
        } else {
            format!("{prefix}{raw_name}")
        }
    }

    fn deprefix_parameter_name<'n>(&self, name: &'n str) -> &'n str {
        name.strip_prefix(self.capabilities().parameter_prefix)
            .unwrap_or(name)
    }

    /// Prefixed name of the `index`th anonymous argument.
    fn anonymous_parameter_name(&self, index: usize) -> String {
        let n = if self.capabilities().one_based_parameters {
            index + 1
        } else {
            index
        };
        self.prefix_parameter_name(&n.to_string())
    }

    fn is_sequence_based(&self) -> bool {
        self.capabilities().key_generation == KeyGeneration::Sequence
    }

    /// Expression yielding the next value of `sequence`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::InvalidInput` on identity-based backends.
    fn build_nextval(&self, sequence: &str) -> Result<String, SqlMapperError> {
        Err(SqlMapperError::InvalidInput(format!(
            "{} uses identity columns; there is no next value for sequence {sequence}",
            self.database_type()
        )))
    }

    /// Statement returning the key generated by the last insert on this connection.
    ///
    /// # Errors
    /// Returns `SqlMapperError::InvalidInput` if the backend needs a sequence name and
    /// none was given.
    fn build_currval_select(&self, sequence: Option<&str>) -> Result<String, SqlMapperError>;

    /// Rewrite an insert so the generated key comes back in the same round trip.
    ///
    /// # Errors
    /// Backends that rewrite inserts return `SqlMapperError::InvalidInput` when the
    /// information they need (such as the sequence name) is missing.
    fn fix_up_insert_command(
        &self,
        _cmd: &mut DbCommand,
        _key_column: &str,
        _sequence: Option<&str>,
    ) -> Result<(), SqlMapperError> {
        Ok(())
    }

    /// Assign `value` to `param`, applying this backend's quirks.
    fn set_parameter_value(&self, param: &mut DbParameter, value: RowValues) {
        param.value = value;
        for quirk in self.capabilities().quirks {
            apply_quirk(*quirk, param);
        }
    }

    /// Build a parameter named by its raw name and assign its value.
    fn make_parameter(&self, raw_name: &str, value: RowValues) -> DbParameter {
        let mut param = DbParameter::input(self.prefix_parameter_name(raw_name), RowValues::Null);
        self.set_parameter_value(&mut param, value);
        param
    }

    /// Whether cursor fetches for `cmd` must run inside the transaction that executes it.
    ///
    /// True for backends whose cursors only live as long as their transaction, when
    /// `cmd` may hand back cursors: it carries cursor parameters or calls a procedure.
    fn requires_wrapping_transaction(&self, cmd: &DbCommand) -> bool {
        match self.capabilities().cursors {
            CursorSupport::RefCursor {
                fetch_in_transaction: true,
                ..
            } => cmd.has_cursor_params() || cmd.kind == CommandKind::StoredProcedure,
            _ => false,
        }
    }

    /// Whether a column's native type name identifies a cursor.
    fn is_cursor_type(&self, type_name: &str) -> bool {
        match self.capabilities().cursors {
            CursorSupport::Unsupported => false,
            CursorSupport::RefCursor { type_tags, .. } => type_tags
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(type_name)),
        }
    }

    /// SQL fetching the next batch from a cursor, for backends that fetch through SQL.
    fn build_cursor_fetch(&self, _cursor: &CursorHandle, _size: FetchSize) -> Option<String> {
        None
    }

    /// SQL closing a cursor, for backends that fetch through SQL.
    fn build_cursor_close(&self, _cursor: &CursorHandle) -> Option<String> {
        None
    }

    /// Statement text invoking a stored procedure with `params`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Unimplemented` on backends without stored procedures.
    fn build_procedure_call(
        &self,
        name: &str,
        params: &[DbParameter],
    ) -> Result<String, SqlMapperError>;

    /// Interpret a catalog default-value literal for `column`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::UnknownDefaultValue` in strict mode for literals no rule
    /// recognises.
    fn default_value(
        &self,
        column: &ColumnMetadata,
        mode: DefaultValueMode,
    ) -> Result<RowValues, SqlMapperError> {
        interpret_default_value(
            &column.column_name,
            column.column_default.as_deref(),
            column.numeric_scale,
            self.capabilities().known_defaults,
            mode,
        )
    }
}

/// Names of the catalog fields a backend reports, used by
/// [`ColumnMetadata::from_catalog_row`].
#[derive(Debug, Clone, Copy)]
pub struct CatalogFields {
    pub column_name: &'static str,
    pub data_type: &'static str,
    pub default: &'static str,
    pub numeric_scale: Option<&'static str>,
    pub numeric_precision: Option<&'static str>,
    pub nullable: Option<&'static str>,
}

fn apply_quirk(quirk: ParameterQuirk, param: &mut DbParameter) {
    match quirk {
        ParameterQuirk::BoolAsTinyInt => {
            if let RowValues::Bool(b) = param.value {
                param.value = RowValues::Int(i64::from(b));
                param.param_type = Some(ParamType::TinyIntBool);
            }
        }
        ParameterQuirk::SizedStrings { max } => {
            if let RowValues::Text(s) = &param.value {
                let len = s.chars().count();
                if i32::try_from(len).is_ok_and(|len| len <= max) {
                    param.size = Some(max);
                    param.param_type = Some(ParamType::NVarChar);
                } else {
                    param.size = Some(-1);
                    param.param_type = Some(ParamType::LongText);
                }
            }
        }
        ParameterQuirk::CursorType => {
            if matches!(param.value, RowValues::Cursor(_))
                || (param.direction != ParameterDirection::Input
                    && param.param_type == Some(ParamType::RefCursor))
            {
                param.param_type = Some(ParamType::RefCursor);
            }
        }
    }
}

/// Shared handle to a dialect.
pub type DialectRef = Arc<dyn Dialect>;

/// The dialect plugin for a backend family.
#[must_use]
pub fn dialect_for(database_type: DatabaseType) -> DialectRef {
    match database_type {
        DatabaseType::SqlServer => Arc::new(SqlServerDialect),
        DatabaseType::MySql => Arc::new(MySqlDialect),
        DatabaseType::Oracle => Arc::new(OracleDialect),
        DatabaseType::Postgres => Arc::new(PostgresDialect),
        DatabaseType::Sqlite => Arc::new(SqliteDialect),
    }
}

/// Comma-separated parameter names for a procedure call, skipping return values.
pub(crate) fn procedure_argument_list(params: &[DbParameter]) -> String {
    params
        .iter()
        .filter(|p| p.direction != ParameterDirection::ReturnValue)
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
