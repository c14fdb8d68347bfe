use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::direction::{Direction, Visibility};
use super::policy::NamingPolicy;
use super::shape::{FieldDecl, Getter, Setter, TypedShape};
use crate::error::SqlMapperError;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

/// A mapped member: its column, permitted direction and bound accessors.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    column: String,
    owner: &'static str,
    storage: &'static str,
    visibility: Visibility,
    direction: Direction,
    key: bool,
    getter: Getter,
    setter: Setter,
}

impl FieldDescriptor {
    fn from_decl(decl: &FieldDecl, owner: &'static str, policy: &NamingPolicy) -> Self {
        Self {
            name: decl.name.clone(),
            column: decl
                .column
                .clone()
                .unwrap_or_else(|| policy.column_for(&decl.name)),
            owner,
            storage: decl.storage,
            visibility: decl.visibility,
            direction: decl.direction | policy.direction_for(&decl.name),
            key: decl.key,
            getter: Arc::clone(&decl.getter),
            setter: Arc::clone(&decl.setter),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    #[must_use]
    pub fn storage(&self) -> &'static str {
        self.storage
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn is_key(&self) -> bool {
        self.key
    }

    /// Read the field from `record` to send it to the database.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ContractViolation` if the field is read-only or
    /// `record` is not of the owner type.
    pub fn get(&self, record: &dyn Any) -> Result<RowValues, SqlMapperError> {
        if !self.direction.allows_write() {
            return Err(self.violation("is not writable to the database"));
        }
        (self.getter)(record).ok_or_else(|| self.wrong_owner())
    }

    /// Store a value loaded from the database into `record`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ContractViolation` if the field is write-only, the
    /// value has the wrong kind, or `record` is not of the owner type.
    pub fn set(&self, record: &mut dyn Any, value: RowValues) -> Result<(), SqlMapperError> {
        if !self.direction.allows_read() {
            return Err(self.violation("is not readable from the database"));
        }
        (self.setter)(record, value)
            .ok_or_else(|| self.wrong_owner())?
            .map_err(|e| self.violation(&format!("rejected its value: {e}")))
    }

    fn violation(&self, what: &str) -> SqlMapperError {
        SqlMapperError::ContractViolation(format!(
            "field {}.{} (column {}) {what}",
            self.owner, self.name, self.column
        ))
    }

    fn wrong_owner(&self) -> SqlMapperError {
        self.violation(&format!("belongs to {}", self.owner))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("owner", &self.owner)
            .field("storage", &self.storage)
            .field("direction", &self.direction)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Resolved mapping between a record shape and result columns.
///
/// Contracts are immutable once built and shared through `Arc`.
#[derive(Debug)]
pub struct DataContract {
    owner: Option<&'static str>,
    fields: Vec<FieldDescriptor>,
    read_columns: Vec<String>,
    by_column: HashMap<String, usize>,
    key_fields: Vec<usize>,
    policy: NamingPolicy,
}

impl DataContract {
    /// Pass-through contract for dynamic rows.
    #[must_use]
    pub fn dynamic() -> Self {
        Self {
            owner: None,
            fields: Vec::new(),
            read_columns: Vec::new(),
            by_column: HashMap::new(),
            key_fields: Vec::new(),
            policy: NamingPolicy::default(),
        }
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.owner.is_none()
    }

    /// Columns to select. Empty means everything.
    #[must_use]
    pub fn read_columns(&self) -> &[String] {
        &self.read_columns
    }

    /// The column list for a SELECT: the read columns, or `*`.
    #[must_use]
    pub fn column_list(&self) -> String {
        if self.read_columns.is_empty() {
            "*".to_string()
        } else {
            self.read_columns.join(", ")
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.key_fields.iter().map(|&i| &self.fields[i])
    }

    #[must_use]
    pub fn field_for_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.by_column
            .get(&self.policy.lookup_key(column))
            .map(|&i| &self.fields[i])
    }

    /// Whether `column` is mapped to a field. Always false for dynamic contracts.
    #[must_use]
    pub fn is_mapped(&self, column: &str) -> bool {
        self.field_for_column(column).is_some()
    }

    /// Build a record from one row. Columns without a field are skipped.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ContractViolation` for dynamic contracts, a `T` that
    /// is not the contract's shape, write-only fields present in the row, or values
    /// of the wrong kind.
    pub fn map_row<T: Any + Default>(&self, row: &CustomDbRow) -> Result<T, SqlMapperError> {
        if self.is_dynamic() {
            return Err(SqlMapperError::ContractViolation(
                "dynamic rows have no record mapping".to_string(),
            ));
        }
        let mut record = T::default();
        for (column, value) in row.column_names.iter().zip(&row.rows) {
            if let Some(field) = self.field_for_column(column) {
                field.set(&mut record, value.clone())?;
            }
        }
        Ok(record)
    }

    /// Build a record from every row of `results`.
    ///
    /// # Errors
    /// See [`DataContract::map_row`].
    pub fn map_rows<T: Any + Default>(&self, results: &ResultSet) -> Result<Vec<T>, SqlMapperError> {
        results.results.iter().map(|row| self.map_row(row)).collect()
    }

    /// `(column, value)` pairs for every field that may be written to the database.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ContractViolation` if `record` is not of the
    /// contract's shape.
    pub fn write_values<T: Any>(&self, record: &T) -> Result<Vec<(String, RowValues)>, SqlMapperError> {
        self.fields
            .iter()
            .filter(|f| f.direction.allows_write())
            .map(|f| f.get(record).map(|value| (f.column.clone(), value)))
            .collect()
    }

    /// Derive the contract for a typed shape.
    pub(crate) fn derive(
        shape: &TypedShape,
        columns: Option<&str>,
        policy: &NamingPolicy,
    ) -> Result<Self, SqlMapperError> {
        let fields: Vec<FieldDescriptor> = match columns {
            Some(list) => resolve_literal(shape, list, policy)?,
            None => shape
                .walk()
                .filter(|decl| is_included(decl, policy))
                .map(|decl| FieldDescriptor::from_decl(decl, shape.type_name, policy))
                .collect(),
        };

        let mut by_column = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if by_column.insert(policy.lookup_key(&field.column), i).is_some() {
                return Err(SqlMapperError::ColumnResolution(format!(
                    "more than one field of {} maps to column {}",
                    shape.type_name, field.column
                )));
            }
        }
        let read_columns = fields
            .iter()
            .filter(|f| f.direction.allows_read())
            .map(|f| f.column.clone())
            .collect();
        let key_fields = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.key)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            owner: Some(shape.type_name),
            fields,
            read_columns,
            by_column,
            key_fields,
            policy: policy.clone(),
        })
    }
}

/// Explicit annotation first, then the policy's ignore predicate, then visibility.
fn is_included(decl: &FieldDecl, policy: &NamingPolicy) -> bool {
    match decl.inclusion {
        Some(explicit) => explicit,
        None => !policy.ignores(&decl.name) && decl.visibility == Visibility::Public,
    }
}

/// Resolve each comma-separated item to exactly one declared field, by field name
/// or by effective column name.
fn resolve_literal(
    shape: &TypedShape,
    list: &str,
    policy: &NamingPolicy,
) -> Result<Vec<FieldDescriptor>, SqlMapperError> {
    let candidates: Vec<FieldDescriptor> = shape
        .walk()
        .map(|decl| FieldDescriptor::from_decl(decl, shape.type_name, policy))
        .collect();
    let mut resolved: Vec<FieldDescriptor> = Vec::new();

    for item in list.split(',').map(str::trim) {
        if item.is_empty() {
            return Err(SqlMapperError::ColumnResolution(format!(
                "empty item in column list {list:?}"
            )));
        }
        let mut matches = candidates
            .iter()
            .filter(|f| policy.names_match(&f.name, item) || policy.names_match(&f.column, item));
        let field = match (matches.next(), matches.next()) {
            (Some(field), None) => field,
            (None, _) => {
                return Err(SqlMapperError::ColumnResolution(format!(
                    "column {item} does not match any field of {}",
                    shape.type_name
                )));
            }
            (Some(_), Some(_)) => {
                return Err(SqlMapperError::ColumnResolution(format!(
                    "column {item} matches more than one field of {}",
                    shape.type_name
                )));
            }
        };
        if resolved.iter().any(|r| r.name == field.name) {
            return Err(SqlMapperError::ColumnResolution(format!(
                "column {item} is listed more than once"
            )));
        }
        if !field.direction.allows_read() {
            return Err(SqlMapperError::ColumnResolution(format!(
                "column {item} is write-only and cannot be selected"
            )));
        }
        resolved.push(field.clone());
    }
    Ok(resolved)
}
