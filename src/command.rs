//! Outbound commands and their parameters.
//!
//! A [`DbCommand`] is what dialects build and fix up, and what a
//! [`DbConnection`](crate::executor::DbConnection) executes. Parameters are bound
//! positionally in the order they appear in `params`.

use crate::types::RowValues;

/// Direction of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

/// Backend type hint attached to a parameter by a dialect's quirk table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Boolean sent as a one-byte integer (`MySQL` `TINYINT(1)`, Oracle `NUMBER(1)`).
    TinyIntBool,
    /// Unicode string with an explicit size.
    NVarChar,
    /// Unbounded unicode string (`NVARCHAR(MAX)` / `CLOB`).
    LongText,
    /// Backend cursor type (`REF CURSOR`, `refcursor`).
    RefCursor,
}

/// One parameter of a [`DbCommand`].
#[derive(Debug, Clone, PartialEq)]
pub struct DbParameter {
    /// Name as it appears in the SQL, including the dialect prefix.
    pub name: String,
    pub value: RowValues,
    pub direction: ParameterDirection,
    /// Declared size; `Some(-1)` means unbounded.
    pub size: Option<i32>,
    pub param_type: Option<ParamType>,
}

impl DbParameter {
    #[must_use]
    pub fn input(name: impl Into<String>, value: RowValues) -> Self {
        Self {
            name: name.into(),
            value,
            direction: ParameterDirection::Input,
            size: None,
            param_type: None,
        }
    }

    #[must_use]
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: RowValues::Null,
            direction: ParameterDirection::Output,
            size: None,
            param_type: None,
        }
    }

    /// Output parameter that will receive a cursor handle.
    #[must_use]
    pub fn cursor(name: impl Into<String>) -> Self {
        Self {
            param_type: Some(ParamType::RefCursor),
            ..Self::output(name)
        }
    }

    #[must_use]
    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    /// True for parameters typed as cursors, whatever their direction.
    #[must_use]
    pub fn is_cursor(&self) -> bool {
        self.param_type == Some(ParamType::RefCursor) || matches!(self.value, RowValues::Cursor(_))
    }
}

/// Whether the command text is plain SQL or the name of a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    #[default]
    Text,
    StoredProcedure,
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbCommand {
    pub sql: String,
    pub params: Vec<DbParameter>,
    pub kind: CommandKind,
}

impl DbCommand {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            kind: CommandKind::Text,
        }
    }

    #[must_use]
    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            sql: name.into(),
            params: Vec::new(),
            kind: CommandKind::StoredProcedure,
        }
    }

    #[must_use]
    pub fn with_param(mut self, param: DbParameter) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn has_cursor_params(&self) -> bool {
        self.params.iter().any(DbParameter::is_cursor)
    }

    /// Remove placeholder cursor parameters and return them.
    ///
    /// Output cursor parameters only signal that the call returns cursors; backends
    /// that hand cursors back as result columns must not bind them.
    pub fn strip_cursor_params(&mut self) -> Vec<DbParameter> {
        let (cursors, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.params)
            .into_iter()
            .partition(|p| p.is_cursor() && p.direction != ParameterDirection::Input);
        self.params = rest;
        cursors
    }

    /// Values of the parameters in binding order.
    #[must_use]
    pub fn values(&self) -> Vec<RowValues> {
        self.params.iter().map(|p| p.value.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CursorHandle;

    #[test]
    fn strips_only_output_cursor_placeholders() {
        let mut cmd = DbCommand::new("select * from f($1)")
            .with_param(DbParameter::input("$1", RowValues::Int(1)))
            .with_param(DbParameter::cursor("c1"))
            .with_param(DbParameter::input(
                "$2",
                RowValues::Cursor(CursorHandle::new("existing")),
            ));
        assert!(cmd.has_cursor_params());
        let stripped = cmd.strip_cursor_params();
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped[0].name, "c1");
        assert_eq!(cmd.params.len(), 2);
        assert_eq!(cmd.values()[0], RowValues::Int(1));
    }
}
