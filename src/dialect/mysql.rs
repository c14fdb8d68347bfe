use super::{
    CursorSupport, Dialect, DialectCapabilities, KeyGeneration, KnownDefault, PagingStrategy,
    ParameterQuirk, SelectSpec, limit_select, procedure_argument_list,
};
use crate::command::DbParameter;
use crate::error::SqlMapperError;
use crate::types::DatabaseType;

static CAPABILITIES: DialectCapabilities = DialectCapabilities {
    paging: PagingStrategy::LimitOffset,
    key_generation: KeyGeneration::Identity,
    parameter_prefix: "@",
    one_based_parameters: false,
    cursors: CursorSupport::Unsupported,
    quirks: &[ParameterQuirk::BoolAsTinyInt],
    rank_column: "RowNumber",
    known_defaults: &[
        ("current_timestamp", KnownDefault::CurrentTimestamp),
        ("current_timestamp()", KnownDefault::CurrentTimestamp),
        ("now()", KnownDefault::CurrentTimestamp),
        ("utc_timestamp()", KnownDefault::CurrentUtcTimestamp),
        ("curdate()", KnownDefault::CurrentDate),
        ("current_date", KnownDefault::CurrentDate),
        ("curtime()", KnownDefault::CurrentTime),
        ("uuid()", KnownDefault::NewIdentifier),
    ],
};

/// `MySQL`/`MariaDB`: `LIMIT` paging, auto-increment keys, booleans as `TINYINT(1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn capabilities(&self) -> &'static DialectCapabilities {
        &CAPABILITIES
    }

    fn build_select(&self, spec: &SelectSpec<'_>) -> Result<String, SqlMapperError> {
        Ok(limit_select(spec))
    }

    fn build_currval_select(&self, _sequence: Option<&str>) -> Result<String, SqlMapperError> {
        Ok("SELECT LAST_INSERT_ID()".to_string())
    }

    fn build_procedure_call(
        &self,
        name: &str,
        params: &[DbParameter],
    ) -> Result<String, SqlMapperError> {
        Ok(format!("CALL {name}({})", procedure_argument_list(params)))
    }
}
