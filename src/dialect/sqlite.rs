use super::{
    CatalogFields, CursorSupport, Dialect, DialectCapabilities, KeyGeneration, KnownDefault,
    PagingStrategy, SelectSpec, limit_select,
};
use crate::command::{DbCommand, DbParameter};
use crate::error::SqlMapperError;
use crate::metadata::ColumnMetadata;
use crate::results::CustomDbRow;
use crate::types::DatabaseType;

static CAPABILITIES: DialectCapabilities = DialectCapabilities {
    paging: PagingStrategy::LimitOffset,
    key_generation: KeyGeneration::Identity,
    parameter_prefix: "@",
    one_based_parameters: false,
    cursors: CursorSupport::Unsupported,
    quirks: &[],
    rank_column: "RowNumber",
    known_defaults: &[
        // SQLite's CURRENT_* keywords are evaluated in UTC
        ("current_timestamp", KnownDefault::CurrentUtcTimestamp),
        ("current_date", KnownDefault::CurrentDate),
        ("current_time", KnownDefault::CurrentTime),
    ],
};

/// `SQLite`: `LIMIT` paging, rowid keys, catalog via `PRAGMA table_info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn capabilities(&self) -> &'static DialectCapabilities {
        &CAPABILITIES
    }

    fn build_select(&self, spec: &SelectSpec<'_>) -> Result<String, SqlMapperError> {
        Ok(limit_select(spec))
    }

    fn build_table_metadata_query(&self, table: &str, owner: Option<&str>) -> DbCommand {
        let table = table.replace('\'', "''");
        match owner {
            Some(schema) => DbCommand::new(format!(
                "PRAGMA \"{}\".table_info('{table}')",
                schema.replace('"', "\"\"")
            )),
            None => DbCommand::new(format!("PRAGMA table_info('{table}')")),
        }
    }

    fn normalize_metadata_row(&self, row: &CustomDbRow) -> Result<ColumnMetadata, SqlMapperError> {
        let mut column = ColumnMetadata::from_catalog_row(
            row,
            &CatalogFields {
                column_name: "name",
                data_type: "type",
                default: "dflt_value",
                numeric_scale: None,
                numeric_precision: None,
                nullable: None,
            },
        )?;
        column.is_nullable = !row
            .get("notnull")
            .and_then(|v| v.as_bool().copied())
            .unwrap_or(false);
        Ok(column)
    }

    fn build_currval_select(&self, _sequence: Option<&str>) -> Result<String, SqlMapperError> {
        Ok("SELECT last_insert_rowid()".to_string())
    }

    fn build_procedure_call(
        &self,
        name: &str,
        _params: &[DbParameter],
    ) -> Result<String, SqlMapperError> {
        Err(SqlMapperError::Unimplemented(format!(
            "SQLite has no stored procedures (called {name})"
        )))
    }
}
