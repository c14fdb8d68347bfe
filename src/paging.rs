//! One page of rows plus the totals needed to render a pager.

use std::any::Any;

use tracing::debug;

use crate::command::{DbCommand, DbParameter};
use crate::contract::DataContract;
use crate::dialect::{Dialect, SelectSpec, page_offset};
use crate::error::SqlMapperError;
use crate::executor::DbConnection;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

#[derive(Debug, Clone, PartialEq)]
pub struct PagedResults<T = CustomDbRow> {
    pub total_records: u64,
    pub total_pages: u64,
    /// 1-based.
    pub current_page: u64,
    pub items: Vec<T>,
}

impl<T> PagedResults<T> {
    /// Convert every item, keeping the totals.
    ///
    /// # Errors
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PagedResults<U>, E> {
        Ok(PagedResults {
            total_records: self.total_records,
            total_pages: self.total_pages,
            current_page: self.current_page,
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

fn total_pages(total_records: u64, page_size: u64) -> u64 {
    total_records.div_ceil(page_size)
}

fn read_count(rows: &ResultSet) -> Result<u64, SqlMapperError> {
    let Some(value) = rows.results.first().and_then(|row| row.get_by_index(0)) else {
        return Ok(0);
    };
    let count = match value {
        RowValues::Int(n) => u64::try_from(*n).ok(),
        RowValues::Text(s) => s.trim().parse().ok(),
        RowValues::Null => Some(0),
        _ => None,
    };
    count.ok_or_else(|| {
        SqlMapperError::ExecutionError(format!("row count query returned {}", value.kind()))
    })
}

/// Run the count and page queries for page `current_page` (1-based) of `spec`.
///
/// `params` are bound to both statements, so the filter may reference them.
///
/// # Errors
/// Returns the dialect's caller-input errors (`MissingOrderBy`, `StarWithJoin`,
/// `InvalidInput` for a zero page or page size) and any driver error.
pub async fn fetch_page<C>(
    conn: &mut C,
    dialect: &dyn Dialect,
    spec: &SelectSpec<'_>,
    params: &[DbParameter],
    page_size: u64,
    current_page: u64,
) -> Result<PagedResults, SqlMapperError>
where
    C: DbConnection + ?Sized,
{
    if current_page == 0 {
        return Err(SqlMapperError::InvalidInput(
            "pages are numbered from 1".to_string(),
        ));
    }
    let offset = page_offset(current_page, page_size);
    let pair = dialect.build_paging_query_pair(spec, page_size, offset)?;
    debug!(table = spec.table, page_size, current_page, "fetching page");

    let count = DbCommand {
        sql: pair.count_sql,
        params: params.to_vec(),
        ..DbCommand::default()
    };
    let total_records = read_count(&conn.query(&count).await?)?;

    let page = DbCommand {
        sql: pair.page_sql,
        params: params.to_vec(),
        ..DbCommand::default()
    };
    let items = conn.query(&page).await?.results;

    Ok(PagedResults {
        total_records,
        total_pages: total_pages(total_records, page_size),
        current_page,
        items,
    })
}

/// [`fetch_page`], selecting the contract's columns and mapping each row into `T`.
///
/// # Errors
/// As [`fetch_page`], plus the contract's mapping errors.
pub async fn fetch_page_as<T, C>(
    conn: &mut C,
    dialect: &dyn Dialect,
    contract: &DataContract,
    spec: &SelectSpec<'_>,
    params: &[DbParameter],
    page_size: u64,
    current_page: u64,
) -> Result<PagedResults<T>, SqlMapperError>
where
    T: Any + Default,
    C: DbConnection + ?Sized,
{
    let columns = contract.column_list();
    let spec = SelectSpec {
        columns: &columns,
        ..*spec
    };
    fetch_page(conn, dialect, &spec, params, page_size, current_page)
        .await?
        .try_map(|row| contract.map_row(&row))
}
