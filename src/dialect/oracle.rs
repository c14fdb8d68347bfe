use super::{
    CatalogFields, CursorSupport, Dialect, DialectCapabilities, KeyGeneration, KnownDefault,
    PagingStrategy, ParameterQuirk, SelectSpec, order_by_fragment, procedure_argument_list,
    qualify_star, where_fragment,
};
use crate::command::{DbCommand, DbParameter};
use crate::error::SqlMapperError;
use crate::metadata::ColumnMetadata;
use crate::results::CustomDbRow;
use crate::types::{DatabaseType, RowValues};

static CAPABILITIES: DialectCapabilities = DialectCapabilities {
    paging: PagingStrategy::RowNumber,
    key_generation: KeyGeneration::Sequence,
    parameter_prefix: ":",
    one_based_parameters: false,
    cursors: CursorSupport::RefCursor {
        type_tags: &["RefCursor", "REF CURSOR", "SYS_REFCURSOR"],
        fetch_in_transaction: false,
    },
    quirks: &[
        ParameterQuirk::BoolAsTinyInt,
        ParameterQuirk::SizedStrings { max: 4000 },
        ParameterQuirk::CursorType,
    ],
    rank_column: "RowNumber",
    known_defaults: &[
        ("sysdate", KnownDefault::CurrentTimestamp),
        ("systimestamp", KnownDefault::CurrentTimestamp),
        ("current_timestamp", KnownDefault::CurrentTimestamp),
        ("localtimestamp", KnownDefault::CurrentTimestamp),
        ("current_date", KnownDefault::CurrentDate),
        ("sys_extract_utc(systimestamp)", KnownDefault::CurrentUtcTimestamp),
        ("sys_guid()", KnownDefault::NewIdentifier),
    ],
};

/// Raw name of the output cursor added by [`OracleDialect::fix_up_insert_command`].
pub const INSERTED_KEY_CURSOR: &str = "inserted_key_cursor";

/// Oracle: `ROWNUM` limits, windowed-rank paging, sequences, `REF CURSOR` results.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

/// Oracle folds unquoted identifiers to upper case; quoted ones keep their case.
fn catalog_identifier(name: &str) -> String {
    let trimmed = name.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(quoted) => quoted.to_string(),
        None => trimmed.to_uppercase(),
    }
}

fn require_sequence(sequence: Option<&str>) -> Result<&str, SqlMapperError> {
    sequence
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            SqlMapperError::InvalidInput(
                "Oracle key generation needs the name of the sequence".to_string(),
            )
        })
}

impl Dialect for OracleDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn capabilities(&self) -> &'static DialectCapabilities {
        &CAPABILITIES
    }

    fn build_select(&self, spec: &SelectSpec<'_>) -> Result<String, SqlMapperError> {
        let columns = qualify_star(spec.columns.trim(), spec.table)?;
        let inner = format!(
            "SELECT {columns} FROM {}{}{}",
            spec.table,
            where_fragment(spec.where_clause),
            order_by_fragment(spec.order_by)
        );
        Ok(match spec.limit {
            // ROWNUM is assigned before ORDER BY, so the limit goes outside the ordered query
            Some(n) => format!("SELECT * FROM ({inner}) WHERE ROWNUM <= {n}"),
            None => inner,
        })
    }

    fn build_table_metadata_query(&self, table: &str, owner: Option<&str>) -> DbCommand {
        let mut cmd = DbCommand::default();
        let mut sql = format!(
            "SELECT * FROM ALL_TAB_COLUMNS WHERE TABLE_NAME = {}",
            self.anonymous_parameter_name(0)
        );
        cmd.params.push(DbParameter::input(
            self.anonymous_parameter_name(0),
            RowValues::Text(catalog_identifier(table)),
        ));
        if let Some(owner) = owner {
            sql.push_str(&format!(" AND OWNER = {}", self.anonymous_parameter_name(1)));
            cmd.params.push(DbParameter::input(
                self.anonymous_parameter_name(1),
                RowValues::Text(catalog_identifier(owner)),
            ));
        }
        sql.push_str(" ORDER BY COLUMN_ID");
        cmd.sql = sql;
        cmd
    }

    fn normalize_metadata_row(&self, row: &CustomDbRow) -> Result<ColumnMetadata, SqlMapperError> {
        ColumnMetadata::from_catalog_row(
            row,
            &CatalogFields {
                column_name: "COLUMN_NAME",
                data_type: "DATA_TYPE",
                default: "DATA_DEFAULT",
                numeric_scale: Some("DATA_SCALE"),
                numeric_precision: Some("DATA_PRECISION"),
                nullable: Some("NULLABLE"),
            },
        )
    }

    fn build_nextval(&self, sequence: &str) -> Result<String, SqlMapperError> {
        Ok(format!("{}.NEXTVAL", require_sequence(Some(sequence))?))
    }

    fn build_currval_select(&self, sequence: Option<&str>) -> Result<String, SqlMapperError> {
        Ok(format!(
            "SELECT {}.CURRVAL FROM DUAL",
            require_sequence(sequence)?
        ))
    }

    /// Wrap the insert in an anonymous block that opens a cursor over the sequence's
    /// current value, so the new key comes back with the insert.
    fn fix_up_insert_command(
        &self,
        cmd: &mut DbCommand,
        key_column: &str,
        sequence: Option<&str>,
    ) -> Result<(), SqlMapperError> {
        let sequence = require_sequence(sequence)?;
        let cursor_name = self.prefix_parameter_name(INSERTED_KEY_CURSOR);
        let insert = cmd.sql.trim().trim_end_matches(';');
        cmd.sql = format!(
            "BEGIN\n{insert};\nOPEN {cursor_name} FOR SELECT {sequence}.CURRVAL AS {key_column} FROM DUAL;\nEND;"
        );
        let mut cursor = DbParameter::cursor(cursor_name);
        self.set_parameter_value(&mut cursor, RowValues::Null);
        cmd.params.push(cursor);
        Ok(())
    }

    fn build_procedure_call(
        &self,
        name: &str,
        params: &[DbParameter],
    ) -> Result<String, SqlMapperError> {
        Ok(format!("BEGIN {name}({}); END;", procedure_argument_list(params)))
    }
}
