use super::SelectSpec;
use super::fragments::{order_by_body, qualify_star, where_fragment};
use crate::error::SqlMapperError;

/// Row-count and page queries built from the same source and filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingQueryPair {
    pub count_sql: String,
    pub page_sql: String,
}

/// Offset of the first row of a 1-based page.
#[must_use]
pub fn page_offset(current_page: u64, page_size: u64) -> u64 {
    current_page.saturating_sub(1).saturating_mul(page_size)
}

fn check_inputs<'a>(spec: &SelectSpec<'a>, page_size: u64) -> Result<&'a str, SqlMapperError> {
    let order = order_by_body(spec.order_by).ok_or(SqlMapperError::MissingOrderBy)?;
    if page_size == 0 {
        return Err(SqlMapperError::InvalidInput(
            "page size must be at least 1".to_string(),
        ));
    }
    Ok(order)
}

fn count_sql(spec: &SelectSpec<'_>) -> String {
    format!(
        "SELECT COUNT(*) FROM {}{}",
        spec.table,
        where_fragment(spec.where_clause)
    )
}

/// `LIMIT`/`OFFSET` paging.
///
/// # Errors
/// Returns `SqlMapperError::MissingOrderBy` without an order clause and
/// `SqlMapperError::InvalidInput` for a zero page size.
pub fn build_limit_offset_pair(
    spec: &SelectSpec<'_>,
    page_size: u64,
    offset: u64,
) -> Result<PagingQueryPair, SqlMapperError> {
    let order = check_inputs(spec, page_size)?;
    let page_sql = format!(
        "SELECT {} FROM {}{} ORDER BY {order} LIMIT {page_size} OFFSET {offset}",
        spec.columns.trim(),
        spec.table,
        where_fragment(spec.where_clause),
    );
    Ok(PagingQueryPair {
        count_sql: count_sql(spec),
        page_sql,
    })
}

/// Windowed-rank paging: rows are numbered in an ordered subquery and the outer
/// query keeps ranks `offset+1 ..= offset+page_size`. The rank column is part of the
/// page's rows.
///
/// # Errors
/// Returns `SqlMapperError::MissingOrderBy` without an order clause,
/// `SqlMapperError::StarWithJoin` for `*` against a join and
/// `SqlMapperError::InvalidInput` for a zero page size.
pub fn build_row_number_pair(
    spec: &SelectSpec<'_>,
    page_size: u64,
    offset: u64,
    rank_column: &str,
) -> Result<PagingQueryPair, SqlMapperError> {
    let order = check_inputs(spec, page_size)?;
    let columns = qualify_star(spec.columns.trim(), spec.table)?;
    let upper = offset.saturating_add(page_size);
    let page_sql = format!(
        "SELECT * FROM (SELECT {columns}, ROW_NUMBER() OVER (ORDER BY {order}) AS {rank_column} FROM {}{}) pagedQueryMain WHERE {rank_column} > {offset} AND {rank_column} <= {upper} ORDER BY {rank_column}",
        spec.table,
        where_fragment(spec.where_clause),
    );
    Ok(PagingQueryPair {
        count_sql: count_sql(spec),
        page_sql,
    })
}
