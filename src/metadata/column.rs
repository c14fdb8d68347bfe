use crate::config::DefaultValueMode;
use crate::dialect::{CatalogFields, Dialect};
use crate::error::SqlMapperError;
use crate::results::CustomDbRow;
use crate::types::RowValues;

/// One catalog row, normalised to the common column vocabulary.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub column_name: String,
    pub data_type: String,
    /// Default-value literal exactly as the catalog reports it.
    pub column_default: Option<String>,
    pub numeric_scale: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub is_nullable: bool,
    /// Whether the data contract maps this column to a field.
    pub is_mapped: bool,
    /// The catalog row as returned by the backend.
    pub raw: CustomDbRow,
}

fn text_of(value: &RowValues) -> Option<String> {
    match value {
        RowValues::Null => None,
        RowValues::Text(s) => Some(s.clone()),
        RowValues::Int(i) => Some(i.to_string()),
        RowValues::Float(f) => Some(f.to_string()),
        RowValues::Bool(b) => Some(b.to_string()),
        RowValues::Timestamp(ts) => Some(ts.to_string()),
        RowValues::JSON(v) => Some(v.to_string()),
        RowValues::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        RowValues::Cursor(c) => Some(c.name().to_string()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integer_of(value: &RowValues) -> Option<i64> {
    match value {
        RowValues::Int(i) => Some(*i),
        RowValues::Float(f) => Some(f.trunc() as i64),
        RowValues::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag_of(value: &RowValues) -> Option<bool> {
    match value {
        RowValues::Bool(b) => Some(*b),
        RowValues::Int(i) => Some(*i != 0),
        RowValues::Text(s) => {
            let s = s.trim();
            Some(
                s.eq_ignore_ascii_case("yes")
                    || s.eq_ignore_ascii_case("y")
                    || s.eq_ignore_ascii_case("true")
                    || s == "1",
            )
        }
        _ => None,
    }
}

impl ColumnMetadata {
    /// Read a catalog row whose field names are given by `fields`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` when the row has no column name.
    pub fn from_catalog_row(
        row: &CustomDbRow,
        fields: &CatalogFields,
    ) -> Result<Self, SqlMapperError> {
        let column_name = row
            .get_ignore_case(fields.column_name)
            .and_then(text_of)
            .ok_or_else(|| {
                SqlMapperError::ExecutionError(format!(
                    "catalog row has no {} value",
                    fields.column_name
                ))
            })?;
        let optional = |name: Option<&str>| name.and_then(|n| row.get_ignore_case(n));

        Ok(Self {
            column_name,
            data_type: row
                .get_ignore_case(fields.data_type)
                .and_then(text_of)
                .unwrap_or_default(),
            column_default: row.get_ignore_case(fields.default).and_then(text_of),
            numeric_scale: optional(fields.numeric_scale).and_then(integer_of),
            numeric_precision: optional(fields.numeric_precision).and_then(integer_of),
            is_nullable: optional(fields.nullable).and_then(flag_of).unwrap_or(true),
            is_mapped: false,
            raw: row.clone(),
        })
    }

    /// The column's default as a value, interpreted by `dialect`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::UnknownDefaultValue` in strict mode for literals the
    /// dialect does not recognise.
    pub fn default_value(
        &self,
        dialect: &dyn Dialect,
        mode: DefaultValueMode,
    ) -> Result<RowValues, SqlMapperError> {
        dialect.default_value(self, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqlServerDialect, SqliteDialect};
    use crate::test_utils::create_test_row;

    #[test]
    fn information_schema_row() {
        let row = create_test_row(
            &["column_name", "data_type", "column_default", "numeric_scale", "is_nullable"],
            vec![
                RowValues::Text("qty".into()),
                RowValues::Text("integer".into()),
                RowValues::Text("0".into()),
                RowValues::Int(0),
                RowValues::Text("NO".into()),
            ],
        );
        let column = PostgresDialect.normalize_metadata_row(&row).unwrap();
        assert_eq!(column.column_name, "qty");
        assert_eq!(column.numeric_scale, Some(0));
        assert!(!column.is_nullable);
        assert_eq!(
            column
                .default_value(&PostgresDialect, DefaultValueMode::Strict)
                .unwrap(),
            RowValues::Int(0)
        );
    }

    #[test]
    fn pragma_row_inverts_notnull() {
        let row = create_test_row(
            &["cid", "name", "type", "notnull", "dflt_value", "pk"],
            vec![
                RowValues::Int(0),
                RowValues::Text("created".into()),
                RowValues::Text("TEXT".into()),
                RowValues::Int(1),
                RowValues::Text("CURRENT_TIMESTAMP".into()),
                RowValues::Int(0),
            ],
        );
        let column = SqliteDialect.normalize_metadata_row(&row).unwrap();
        assert_eq!(column.column_name, "created");
        assert!(!column.is_nullable);
        assert!(matches!(
            column.default_value(&SqliteDialect, DefaultValueMode::Strict).unwrap(),
            RowValues::Timestamp(_)
        ));
    }

    #[test]
    fn missing_default_and_name() {
        let row = create_test_row(
            &["COLUMN_NAME", "DATA_TYPE", "COLUMN_DEFAULT"],
            vec![
                RowValues::Text("Id".into()),
                RowValues::Text("int".into()),
                RowValues::Null,
            ],
        );
        let column = SqlServerDialect.normalize_metadata_row(&row).unwrap();
        assert_eq!(column.column_default, None);
        assert!(column.is_nullable);

        let nameless = create_test_row(&["DATA_TYPE"], vec![RowValues::Text("int".into())]);
        assert!(SqlServerDialect.normalize_metadata_row(&nameless).is_err());
    }
}
