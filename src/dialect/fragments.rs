use std::borrow::Cow;

use crate::error::SqlMapperError;

fn strip_keyword<'a>(clause: &'a str, keyword: &str) -> &'a str {
    let trimmed = clause.trim();
    let len = keyword.len();
    if trimmed.len() > len
        && trimmed.is_char_boundary(len)
        && trimmed[..len].eq_ignore_ascii_case(keyword)
        && trimmed[len..].starts_with(char::is_whitespace)
    {
        trimmed[len..].trim_start()
    } else {
        trimmed
    }
}

/// ` WHERE <clause>`, or empty. A leading `WHERE` in the clause is not repeated.
#[must_use]
pub fn where_fragment(where_clause: Option<&str>) -> String {
    match where_clause.map(|w| strip_keyword(w, "WHERE")) {
        Some(body) if !body.is_empty() => format!(" WHERE {body}"),
        _ => String::new(),
    }
}

/// The order clause without any leading `ORDER BY`, or `None` when blank.
#[must_use]
pub fn order_by_body(order_by: Option<&str>) -> Option<&str> {
    order_by
        .map(|o| strip_keyword(o, "ORDER BY"))
        .filter(|body| !body.is_empty())
}

/// ` ORDER BY <clause>`, or empty.
#[must_use]
pub fn order_by_fragment(order_by: Option<&str>) -> String {
    order_by_body(order_by)
        .map(|body| format!(" ORDER BY {body}"))
        .unwrap_or_default()
}

/// Whether a table expression names more than one table.
#[must_use]
pub fn is_join(table: &str) -> bool {
    table.contains(',')
        || table
            .split_whitespace()
            .any(|word| word.eq_ignore_ascii_case("JOIN"))
}

/// Qualify a bare `*` with the table (or its alias) so it can sit next to the rank
/// column of windowed-rank paging.
///
/// # Errors
/// Returns `SqlMapperError::StarWithJoin` for `*` against a join, where duplicate
/// column names would make the paged subquery ambiguous.
pub fn qualify_star<'a>(columns: &'a str, table: &str) -> Result<Cow<'a, str>, SqlMapperError> {
    if columns.trim() != "*" {
        return Ok(Cow::Borrowed(columns));
    }
    if is_join(table) {
        return Err(SqlMapperError::StarWithJoin {
            table: table.trim().to_string(),
        });
    }
    // `people`, `people p` and `people AS p` are all single tables; use the alias when present.
    let qualifier = table.split_whitespace().last().unwrap_or(table);
    Ok(Cow::Owned(format!("{qualifier}.*")))
}

/// `SELECT ... LIMIT n`, shared by the backends that page with `LIMIT`/`OFFSET`.
pub(crate) fn limit_select(spec: &super::SelectSpec<'_>) -> String {
    let limit = spec
        .limit
        .map(|n| format!(" LIMIT {n}"))
        .unwrap_or_default();
    format!(
        "SELECT {} FROM {}{}{}{limit}",
        spec.columns.trim(),
        spec.table,
        where_fragment(spec.where_clause),
        order_by_fragment(spec.order_by)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_keyword_is_optional() {
        assert_eq!(where_fragment(Some("id > 3")), " WHERE id > 3");
        assert_eq!(where_fragment(Some("where id > 3")), " WHERE id > 3");
        assert_eq!(where_fragment(Some("  WHERE  id > 3 ")), " WHERE id > 3");
        assert_eq!(where_fragment(Some("   ")), "");
        assert_eq!(where_fragment(None), "");
        // a column that merely starts with the keyword is kept
        assert_eq!(where_fragment(Some("whereabouts = 1")), " WHERE whereabouts = 1");
    }

    #[test]
    fn order_keyword_is_optional() {
        assert_eq!(order_by_fragment(Some("ORDER BY id DESC")), " ORDER BY id DESC");
        assert_eq!(order_by_fragment(Some("name")), " ORDER BY name");
        assert_eq!(order_by_body(Some("order by a, b")), Some("a, b"));
        assert_eq!(order_by_body(Some("")), None);
        assert_eq!(order_by_body(None), None);
    }

    #[test]
    fn joins_are_detected() {
        assert!(is_join("t1 JOIN t2 ON t1.id = t2.id"));
        assert!(is_join("t1 inner join t2 on t1.id = t2.id"));
        assert!(is_join("t1, t2"));
        assert!(!is_join("t1"));
        assert!(!is_join("t1 AS a"));
        assert!(!is_join("joins"));
    }

    #[test]
    fn star_is_qualified_or_rejected() {
        assert_eq!(qualify_star("*", "t1").unwrap(), "t1.*");
        assert_eq!(qualify_star(" * ", "people p").unwrap(), "p.*");
        assert_eq!(qualify_star("id, name", "t1 JOIN t2 ON 1=1").unwrap(), "id, name");
        let err = qualify_star("*", "t1 JOIN t2 ON t1.id = t2.id").unwrap_err();
        assert!(matches!(err, SqlMapperError::StarWithJoin { .. }));
        assert!(err.is_caller_input());
    }
}
