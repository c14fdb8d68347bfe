use super::{
    CursorSupport, Dialect, DialectCapabilities, KeyGeneration, KnownDefault, PagingStrategy,
    ParameterQuirk, SelectSpec, limit_select,
};
use crate::command::{DbCommand, DbParameter, ParameterDirection};
use crate::config::FetchSize;
use crate::error::SqlMapperError;
use crate::types::{CursorHandle, DatabaseType, RowValues};

static CAPABILITIES: DialectCapabilities = DialectCapabilities {
    paging: PagingStrategy::LimitOffset,
    key_generation: KeyGeneration::Sequence,
    parameter_prefix: "$",
    one_based_parameters: true,
    cursors: CursorSupport::RefCursor {
        type_tags: &["refcursor"],
        fetch_in_transaction: true,
    },
    quirks: &[ParameterQuirk::CursorType],
    rank_column: "RowNumber",
    known_defaults: &[
        ("now()", KnownDefault::CurrentTimestamp),
        ("current_timestamp", KnownDefault::CurrentTimestamp),
        ("localtimestamp", KnownDefault::CurrentTimestamp),
        ("transaction_timestamp()", KnownDefault::CurrentTimestamp),
        ("timezone('utc'::text, now())", KnownDefault::CurrentUtcTimestamp),
        ("now() at time zone 'utc'", KnownDefault::CurrentUtcTimestamp),
        ("current_date", KnownDefault::CurrentDate),
        ("current_time", KnownDefault::CurrentTime),
        ("gen_random_uuid()", KnownDefault::NewIdentifier),
        ("uuid_generate_v4()", KnownDefault::NewIdentifier),
        ("nextval(", KnownDefault::Generated),
    ],
};

/// `PostgreSQL`: `LIMIT` paging, sequences, `refcursor` results fetched with `FETCH`
/// inside the creating transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Dialect for PostgresDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn capabilities(&self) -> &'static DialectCapabilities {
        &CAPABILITIES
    }

    fn build_select(&self, spec: &SelectSpec<'_>) -> Result<String, SqlMapperError> {
        Ok(limit_select(spec))
    }

    fn build_table_metadata_query(&self, table: &str, owner: Option<&str>) -> DbCommand {
        let mut cmd = DbCommand::default();
        let mut sql = "SELECT * FROM information_schema.columns WHERE table_name = $1".to_string();
        cmd.params
            .push(DbParameter::input("$1", RowValues::Text(table.to_string())));
        if let Some(owner) = owner {
            sql.push_str(" AND table_schema = $2");
            cmd.params
                .push(DbParameter::input("$2", RowValues::Text(owner.to_string())));
        }
        sql.push_str(" ORDER BY ordinal_position");
        cmd.sql = sql;
        cmd
    }

    fn build_nextval(&self, sequence: &str) -> Result<String, SqlMapperError> {
        Ok(format!("nextval({})", quote_literal(sequence)))
    }

    fn build_currval_select(&self, sequence: Option<&str>) -> Result<String, SqlMapperError> {
        Ok(match sequence {
            Some(seq) => format!("SELECT currval({})", quote_literal(seq)),
            None => "SELECT lastval()".to_string(),
        })
    }

    fn build_cursor_fetch(&self, cursor: &CursorHandle, size: FetchSize) -> Option<String> {
        let name = quote_identifier(cursor.name());
        Some(match size {
            FetchSize::Rows(n) => format!("FETCH {n} FROM {name}"),
            FetchSize::All => format!("FETCH ALL FROM {name}"),
        })
    }

    fn build_cursor_close(&self, cursor: &CursorHandle) -> Option<String> {
        Some(format!("CLOSE {}", quote_identifier(cursor.name())))
    }

    /// Functions are called with their input arguments only; `OUT` values come back as
    /// columns of the result.
    fn build_procedure_call(
        &self,
        name: &str,
        params: &[DbParameter],
    ) -> Result<String, SqlMapperError> {
        let args = params
            .iter()
            .filter(|p| {
                matches!(
                    p.direction,
                    ParameterDirection::Input | ParameterDirection::InputOutput
                )
            })
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("SELECT * FROM {name}({args})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_and_lastval() {
        assert_eq!(
            PostgresDialect.build_nextval("people_id_seq").unwrap(),
            "nextval('people_id_seq')"
        );
        assert_eq!(
            PostgresDialect.build_currval_select(Some("people_id_seq")).unwrap(),
            "SELECT currval('people_id_seq')"
        );
        assert_eq!(
            PostgresDialect.build_currval_select(None).unwrap(),
            "SELECT lastval()"
        );
    }

    #[test]
    fn paging_uses_limit_offset() {
        let pair = PostgresDialect
            .build_paging_query_pair(&SelectSpec::new("people").order_by("id"), 25, 50)
            .unwrap();
        assert_eq!(pair.page_sql, "SELECT * FROM people ORDER BY id LIMIT 25 OFFSET 50");
        assert!(!pair.page_sql.contains("RowNumber"));
    }

    #[test]
    fn cursor_statements_quote_names() {
        let cursor = CursorHandle::new("<unnamed portal 1>");
        assert_eq!(
            PostgresDialect.build_cursor_fetch(&cursor, FetchSize::rows(500).unwrap()).unwrap(),
            "FETCH 500 FROM \"<unnamed portal 1>\""
        );
        assert_eq!(
            PostgresDialect.build_cursor_fetch(&cursor, FetchSize::All).unwrap(),
            "FETCH ALL FROM \"<unnamed portal 1>\""
        );
        assert_eq!(
            PostgresDialect.build_cursor_close(&CursorHandle::new("a\"b")).unwrap(),
            "CLOSE \"a\"\"b\""
        );
    }

    #[test]
    fn cursor_calls_need_a_transaction() {
        let plain = DbCommand::new("SELECT 1");
        assert!(!PostgresDialect.requires_wrapping_transaction(&plain));
        let with_cursor = DbCommand::new("SELECT * FROM get_people()")
            .with_param(DbParameter::cursor("people"));
        assert!(PostgresDialect.requires_wrapping_transaction(&with_cursor));
        assert!(PostgresDialect.requires_wrapping_transaction(&DbCommand::procedure("f")));
    }

    #[test]
    fn function_call_passes_inputs_only() {
        let params = [
            DbParameter::input("$1", RowValues::Int(3)),
            DbParameter::output("total"),
        ];
        assert_eq!(
            PostgresDialect.build_procedure_call("totals", &params).unwrap(),
            "SELECT * FROM totals($1)"
        );
    }
}
