use rusqlite::types::Value;

use crate::command::{DbCommand, ParameterDirection};
use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
        RowValues::Cursor(handle) => Value::Text(handle.name().to_string()),
    }
}

/// A parameter ready to bind: by name when the statement declares it, otherwise
/// by its position among the command's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub value: Value,
}

/// Owned parameter list, safe to move onto a blocking thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(pub Vec<BoundParam>);

impl Params {
    /// Input parameters of `cmd`. Output placeholders are dropped; SQLite has no
    /// output binding.
    #[must_use]
    pub fn from_command(cmd: &DbCommand) -> Self {
        Params(
            cmd.params
                .iter()
                .filter(|p| p.direction != ParameterDirection::Output)
                .map(|p| BoundParam {
                    name: p.name.clone(),
                    value: row_value_to_sqlite_value(&p.value),
                })
                .collect(),
        )
    }

    /// Bind every parameter to `stmt`.
    ///
    /// # Errors
    /// Returns the driver's error if a value cannot be bound.
    pub fn bind(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<()> {
        for (position, param) in self.0.iter().enumerate() {
            let index = named_index(stmt, &param.name)?.unwrap_or(position + 1);
            stmt.raw_bind_parameter(index, &param.value)?;
        }
        Ok(())
    }
}

fn named_index(stmt: &rusqlite::Statement<'_>, name: &str) -> rusqlite::Result<Option<usize>> {
    if name.is_empty() {
        return Ok(None);
    }
    if name.starts_with(['@', ':', '$']) {
        return stmt.parameter_index(name);
    }
    for prefix in ['@', ':', '$'] {
        if let Some(index) = stmt.parameter_index(&format!("{prefix}{name}"))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DbParameter;
    use chrono::NaiveDate;

    #[test]
    fn values_convert_to_sqlite_storage_classes() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(row_value_to_sqlite_value(&RowValues::Bool(true)), Value::Integer(1));
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Timestamp(ts)),
            Value::Text("2024-03-01 12:30:00".into())
        );
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::JSON(serde_json::json!({"a": 1}))),
            Value::Text("{\"a\":1}".into())
        );
    }

    #[test]
    fn binds_by_name_then_position() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT @1 - @0, ?3").unwrap();
        let cmd = DbCommand::new("")
            .with_param(DbParameter::input("@0", RowValues::Int(2)))
            .with_param(DbParameter::input("1", RowValues::Int(10)))
            .with_param(DbParameter::input("", RowValues::Text("third".into())))
            .with_param(DbParameter::cursor("ignored"));
        let params = Params::from_command(&cmd);
        assert_eq!(params.0.len(), 3);
        params.bind(&mut stmt).unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 8);
        assert_eq!(row.get::<_, String>(1).unwrap(), "third");
    }
}
