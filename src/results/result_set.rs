use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_index};
use crate::types::RowValues;

/// A result set from a database query
///
/// This struct represents the result of a database query,
/// containing the rows returned by the query and metadata.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    /// Native type name of each column as reported by the driver (`refcursor`, `int4`, ...)
    column_types: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Convenience constructor used by drivers that already hold every row.
    #[must_use]
    pub fn from_rows(column_names: Vec<String>, rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(rows.len());
        result_set.set_column_names(Arc::new(column_names));
        for row in rows {
            result_set.add_row_values(row);
        }
        result_set
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(build_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Record the driver's native type name for each column.
    pub fn set_column_types(&mut self, column_types: Arc<Vec<String>>) {
        self.column_types = Some(column_types);
    }

    /// Native type names, when the driver reports them.
    #[must_use]
    pub fn get_column_types(&self) -> Option<&Arc<Vec<String>>> {
        self.column_types.as_ref()
    }

    /// Add a row to the result set
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        {
            let row = CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(cache),
            };

            self.results.push(row);
            self.rows_affected += 1;
        }
    }

    /// Add a row to the result set
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_index_cache = Some(Arc::clone(&row.column_index_cache));
            self.column_names = Some(Arc::clone(&row.column_names));
        }

        self.results.push(row);
        self.rows_affected += 1;
    }

    /// Append every row of `other`, adopting its column names if none are set yet.
    pub fn extend(&mut self, other: ResultSet) {
        if self.column_names.is_none() {
            self.column_names = other.column_names;
            self.column_index_cache = other.column_index_cache;
            self.column_types = other.column_types;
        }
        self.rows_affected += other.results.len();
        self.results.extend(other.results);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_lookup() {
        let rs = ResultSet::from_rows(
            vec!["id".into(), "Name".into()],
            vec![
                vec![RowValues::Int(1), RowValues::Text("a".into())],
                vec![RowValues::Int(2), RowValues::Text("b".into())],
            ],
        );
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.results[1].get("id"), Some(&RowValues::Int(2)));
        assert_eq!(
            rs.results[0].get_ignore_case("NAME"),
            Some(&RowValues::Text("a".into()))
        );
        assert!(rs.results[0].get("missing").is_none());
    }

    #[test]
    fn extend_adopts_columns() {
        let mut all = ResultSet::default();
        all.extend(ResultSet::from_rows(
            vec!["x".into()],
            vec![vec![RowValues::Int(1)]],
        ));
        all.extend(ResultSet::from_rows(
            vec!["x".into()],
            vec![vec![RowValues::Int(2)]],
        ));
        assert_eq!(all.len(), 2);
        assert_eq!(all.get_column_names().map(|c| c.len()), Some(1));
    }
}
