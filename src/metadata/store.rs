use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use super::column::ColumnMetadata;
use crate::cache::AsyncKeyedStore;
use crate::contract::DataContract;
use crate::dialect::Dialect;
use crate::error::SqlMapperError;
use crate::executor::DbConnection;
use crate::types::DatabaseType;

/// A contract compared by identity. Contracts come from a
/// [`DataContractStore`](crate::contract::DataContractStore), so equal contract keys
/// share one `Arc`.
#[derive(Debug, Clone)]
struct ContractIdentity(Arc<DataContract>);

impl PartialEq for ContractIdentity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ContractIdentity {}

impl Hash for ContractIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// Everything a table's metadata depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableMetadataKey {
    database_type: DatabaseType,
    driver: &'static str,
    connection_string: String,
    table: String,
    owner: Option<String>,
    contract: ContractIdentity,
}

impl TableMetadataKey {
    #[must_use]
    pub fn new(
        database_type: DatabaseType,
        driver: &'static str,
        connection_string: &str,
        table: &str,
        owner: Option<&str>,
        contract: &Arc<DataContract>,
    ) -> Self {
        Self {
            database_type,
            driver,
            connection_string: connection_string.to_string(),
            table: table.to_string(),
            owner: owner.map(str::to_string),
            contract: ContractIdentity(Arc::clone(contract)),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Memoizes catalog rows per table, connection and contract.
#[derive(Default)]
pub struct TableMetadataStore {
    tables: AsyncKeyedStore<TableMetadataKey, Vec<ColumnMetadata>>,
}

impl TableMetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns of `table`, fetched through `conn` on first use.
    ///
    /// Each column is stamped with whether `contract` maps it.
    ///
    /// # Errors
    /// Returns `SqlMapperError::TableMetadataNotFound` when the catalog has no rows
    /// for the table; driver errors propagate unchanged. Neither is cached.
    pub async fn get<C>(
        &self,
        dialect: &dyn Dialect,
        conn: &mut C,
        connection_string: &str,
        table: &str,
        owner: Option<&str>,
        contract: &Arc<DataContract>,
    ) -> Result<Arc<Vec<ColumnMetadata>>, SqlMapperError>
    where
        C: DbConnection + ?Sized,
    {
        let key = TableMetadataKey::new(
            dialect.database_type(),
            conn.driver_name(),
            connection_string,
            table,
            owner,
            contract,
        );
        self.tables
            .get_or_try_insert_with(&key, move || async move {
                let cmd = dialect.build_table_metadata_query(table, owner);
                debug!(table, owner, sql = %cmd.sql, "fetching table metadata");
                let rows = conn.query(&cmd).await?;
                if rows.results.is_empty() {
                    let table = match owner {
                        Some(owner) => format!("{owner}.{table}"),
                        None => table.to_string(),
                    };
                    return Err(SqlMapperError::TableMetadataNotFound { table });
                }
                rows.results
                    .iter()
                    .map(|row| {
                        let mut column = dialect.normalize_metadata_row(row)?;
                        column.is_mapped = contract.is_mapped(&column.column_name);
                        Ok(column)
                    })
                    .collect()
            })
            .await
    }

    /// Drop every cached table.
    pub fn flush(&self) {
        self.tables.clear();
    }

    /// Number of cached tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn fetches(&self) -> usize {
        self.tables.derivations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{DataContractStore, NamingPolicy, ShapeBuilder};
    use crate::dialect::{OracleDialect, SqlServerDialect};
    use crate::test_utils::{FakeConnection, result_set};
    use crate::types::RowValues;

    #[derive(Default)]
    struct Person {
        id: i64,
    }

    fn person_contract(store: &DataContractStore) -> Arc<DataContract> {
        let shape = ShapeBuilder::<Person>::new()
            .field("Id", |p| p.id, |p, v| p.id = v)
            .build();
        store.get(&shape, None, &NamingPolicy::new()).unwrap()
    }

    fn people_catalog() -> crate::results::ResultSet {
        result_set(
            &["COLUMN_NAME", "DATA_TYPE", "COLUMN_DEFAULT", "NUMERIC_SCALE", "IS_NULLABLE"],
            vec![
                vec![
                    RowValues::Text("Id".into()),
                    RowValues::Text("int".into()),
                    RowValues::Null,
                    RowValues::Int(0),
                    RowValues::Text("NO".into()),
                ],
                vec![
                    RowValues::Text("Created".into()),
                    RowValues::Text("datetime".into()),
                    RowValues::Text("(getdate())".into()),
                    RowValues::Null,
                    RowValues::Text("YES".into()),
                ],
            ],
        )
    }

    #[tokio::test]
    async fn fetches_once_and_stamps_mapping() {
        let dialect = SqlServerDialect;
        let sql = dialect.build_table_metadata_query("People", None).sql;
        let mut conn = FakeConnection::default().with_fixture(&sql, people_catalog());
        let contracts = DataContractStore::new();
        let contract = person_contract(&contracts);
        let store = TableMetadataStore::new();

        let first = store
            .get(&dialect, &mut conn, "Server=a", "People", None, &contract)
            .await
            .unwrap();
        let second = store
            .get(&dialect, &mut conn, "Server=a", "People", None, &contract)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(conn.count("query"), 1);
        assert_eq!(store.fetches(), 1);

        assert!(first[0].is_mapped);
        assert!(!first[1].is_mapped);
        assert_eq!(conn.executed[0].values(), vec![RowValues::Text("People".into())]);
    }

    #[tokio::test]
    async fn connection_identity_is_part_of_the_key() {
        let dialect = SqlServerDialect;
        let sql = dialect.build_table_metadata_query("People", None).sql;
        let mut conn = FakeConnection::default().with_fixture(&sql, people_catalog());
        let contract = person_contract(&DataContractStore::new());
        let store = TableMetadataStore::new();
        for cs in ["Server=a", "Server=b", "Server=a"] {
            store
                .get(&dialect, &mut conn, cs, "People", None, &contract)
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 2);
        store.flush();
        assert!(store.is_empty());
        store
            .get(&dialect, &mut conn, "Server=a", "People", None, &contract)
            .await
            .unwrap();
        assert_eq!(conn.count("query"), 3);
    }

    #[tokio::test]
    async fn empty_catalog_is_a_hard_error_and_not_cached() {
        let dialect = OracleDialect;
        let sql = dialect.build_table_metadata_query("missing", Some("hr")).sql;
        let mut conn = FakeConnection::default().with_fixture(&sql, result_set(&["COLUMN_NAME"], vec![]));
        let contract = Arc::new(DataContract::dynamic());
        let store = TableMetadataStore::new();
        let err = store
            .get(&dialect, &mut conn, "db", "missing", Some("hr"), &contract)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SqlMapperError::TableMetadataNotFound { ref table } if table == "hr.missing"
        ));
        assert!(store.is_empty());

        let _ = store
            .get(&dialect, &mut conn, "db", "missing", Some("hr"), &contract)
            .await;
        assert_eq!(conn.count("query"), 2);
    }

    #[tokio::test]
    async fn driver_errors_propagate() {
        let mut conn = FakeConnection::default();
        let store = TableMetadataStore::new();
        let contract = Arc::new(DataContract::dynamic());
        let err = store
            .get(&SqlServerDialect, &mut conn, "db", "People", None, &contract)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ExecutionError(_)));
    }
}
