use super::{
    CursorSupport, Dialect, DialectCapabilities, KeyGeneration, KnownDefault, PagingStrategy,
    ParameterQuirk, SelectSpec, order_by_fragment, procedure_argument_list, qualify_star,
    where_fragment,
};
use crate::command::DbParameter;
use crate::error::SqlMapperError;
use crate::types::DatabaseType;

static CAPABILITIES: DialectCapabilities = DialectCapabilities {
    paging: PagingStrategy::RowNumber,
    key_generation: KeyGeneration::Identity,
    parameter_prefix: "@",
    one_based_parameters: false,
    cursors: CursorSupport::Unsupported,
    quirks: &[ParameterQuirk::SizedStrings { max: 4000 }],
    rank_column: "[RowNumber]",
    known_defaults: &[
        ("getdate()", KnownDefault::CurrentTimestamp),
        ("sysdatetime()", KnownDefault::CurrentTimestamp),
        ("current_timestamp", KnownDefault::CurrentTimestamp),
        ("getutcdate()", KnownDefault::CurrentUtcTimestamp),
        ("sysutcdatetime()", KnownDefault::CurrentUtcTimestamp),
        ("newid()", KnownDefault::NewIdentifier),
        ("newsequentialid()", KnownDefault::NewIdentifier),
    ],
};

/// SQL Server: `TOP n` selects, windowed-rank paging, identity keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    fn capabilities(&self) -> &'static DialectCapabilities {
        &CAPABILITIES
    }

    fn build_select(&self, spec: &SelectSpec<'_>) -> Result<String, SqlMapperError> {
        let columns = qualify_star(spec.columns.trim(), spec.table)?;
        let top = spec
            .limit
            .map(|n| format!("TOP {n} "))
            .unwrap_or_default();
        Ok(format!(
            "SELECT {top}{columns} FROM {}{}{}",
            spec.table,
            where_fragment(spec.where_clause),
            order_by_fragment(spec.order_by)
        ))
    }

    fn build_currval_select(&self, _sequence: Option<&str>) -> Result<String, SqlMapperError> {
        Ok("SELECT SCOPE_IDENTITY() AS LastInsertId".to_string())
    }

    fn build_procedure_call(
        &self,
        name: &str,
        params: &[DbParameter],
    ) -> Result<String, SqlMapperError> {
        let args = procedure_argument_list(params);
        if args.is_empty() {
            Ok(format!("EXEC {name}"))
        } else {
            Ok(format!("EXEC {name} {args}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    #[test]
    fn select_with_top() {
        let sql = SqlServerDialect
            .build_select(
                &SelectSpec::new("people")
                    .columns("id, name")
                    .filter("age > @0")
                    .order_by("name")
                    .limit(5),
            )
            .unwrap();
        assert_eq!(sql, "SELECT TOP 5 id, name FROM people WHERE age > @0 ORDER BY name");
    }

    #[test]
    fn star_against_join_is_rejected() {
        let err = SqlServerDialect
            .build_select(&SelectSpec::new("t1 JOIN t2 ON t1.id = t2.t1_id"))
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::StarWithJoin { .. }));
        assert!(
            SqlServerDialect
                .build_paging_query_pair(
                    &SelectSpec::new("t1 JOIN t2 ON t1.id = t2.t1_id").order_by("t1.id"),
                    10,
                    0
                )
                .is_err()
        );
    }

    #[test]
    fn star_against_table_is_qualified() {
        let sql = SqlServerDialect.build_select(&SelectSpec::new("t1")).unwrap();
        assert_eq!(sql, "SELECT t1.* FROM t1");
        let pair = SqlServerDialect
            .build_paging_query_pair(&SelectSpec::new("t1").order_by("id"), 30, 0)
            .unwrap();
        assert!(pair.page_sql.contains("SELECT t1.*, ROW_NUMBER() OVER (ORDER BY id)"));
        assert!(pair.page_sql.contains("[RowNumber] > 0 AND [RowNumber] <= 30"));
    }

    #[test]
    fn identity_retrieval() {
        assert_eq!(
            SqlServerDialect.build_currval_select(None).unwrap(),
            "SELECT SCOPE_IDENTITY() AS LastInsertId"
        );
    }

    #[test]
    fn procedure_call_lists_arguments() {
        let params = [
            SqlServerDialect.make_parameter("id", RowValues::Int(1)),
            DbParameter::output("@total"),
        ];
        assert_eq!(
            SqlServerDialect.build_procedure_call("dbo.get_totals", &params).unwrap(),
            "EXEC dbo.get_totals @id, @total"
        );
    }
}
