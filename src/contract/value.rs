use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;
use crate::types::{CursorHandle, RowValues};

/// Conversion between a record field's Rust type and [`RowValues`].
pub trait FieldValue: Sized {
    /// Name of the storage kind, reported in field descriptors.
    const STORAGE: &'static str;

    fn to_value(&self) -> RowValues;

    /// # Errors
    /// Returns `SqlMapperError::ContractViolation` when `value` has the wrong kind.
    fn from_value(value: RowValues) -> Result<Self, SqlMapperError>;
}

fn mismatch(expected: &str, value: &RowValues) -> SqlMapperError {
    SqlMapperError::ContractViolation(format!(
        "expected a {expected} value, got {}",
        value.kind()
    ))
}

impl FieldValue for i64 {
    const STORAGE: &'static str = "int";

    fn to_value(&self) -> RowValues {
        RowValues::Int(*self)
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        value.as_int().copied().ok_or_else(|| mismatch("int", &value))
    }
}

impl FieldValue for i32 {
    const STORAGE: &'static str = "int";

    fn to_value(&self) -> RowValues {
        RowValues::Int(i64::from(*self))
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        value
            .as_int()
            .and_then(|i| i32::try_from(*i).ok())
            .ok_or_else(|| mismatch("32-bit int", &value))
    }
}

impl FieldValue for f64 {
    const STORAGE: &'static str = "float";

    fn to_value(&self) -> RowValues {
        RowValues::Float(*self)
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        value.as_float().ok_or_else(|| mismatch("float", &value))
    }
}

impl FieldValue for bool {
    const STORAGE: &'static str = "bool";

    fn to_value(&self) -> RowValues {
        RowValues::Bool(*self)
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        value.as_bool().copied().ok_or_else(|| mismatch("bool", &value))
    }
}

impl FieldValue for String {
    const STORAGE: &'static str = "text";

    fn to_value(&self) -> RowValues {
        RowValues::Text(self.clone())
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        match value {
            RowValues::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FieldValue for NaiveDateTime {
    const STORAGE: &'static str = "timestamp";

    fn to_value(&self) -> RowValues {
        RowValues::Timestamp(*self)
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        value.as_timestamp().ok_or_else(|| mismatch("timestamp", &value))
    }
}

impl FieldValue for Vec<u8> {
    const STORAGE: &'static str = "blob";

    fn to_value(&self) -> RowValues {
        RowValues::Blob(self.clone())
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        match value {
            RowValues::Blob(b) => Ok(b),
            other => Err(mismatch("blob", &other)),
        }
    }
}

impl FieldValue for JsonValue {
    const STORAGE: &'static str = "json";

    fn to_value(&self) -> RowValues {
        RowValues::JSON(self.clone())
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        match value {
            RowValues::JSON(v) => Ok(v),
            RowValues::Text(s) => serde_json::from_str(&s)
                .map_err(|e| SqlMapperError::ContractViolation(format!("invalid json: {e}"))),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl FieldValue for CursorHandle {
    const STORAGE: &'static str = "cursor";

    fn to_value(&self) -> RowValues {
        RowValues::Cursor(self.clone())
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        match value {
            RowValues::Cursor(c) => Ok(c),
            other => Err(mismatch("cursor", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const STORAGE: &'static str = T::STORAGE;

    fn to_value(&self) -> RowValues {
        self.as_ref().map_or(RowValues::Null, FieldValue::to_value)
    }

    fn from_value(value: RowValues) -> Result<Self, SqlMapperError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
