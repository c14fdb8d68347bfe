use std::any::TypeId;
use std::sync::Arc;

use super::direction::{Direction, Visibility};
use super::policy::NamingPolicy;
use super::shape::{FieldDecl, RecordShape, TypedShape};
use crate::error::SqlMapperError;

/// The parts of a field declaration a contract is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSignature {
    name: String,
    visibility: Visibility,
    storage: &'static str,
    column: Option<String>,
    inclusion: Option<bool>,
    direction: Direction,
    key: bool,
}

impl From<&FieldDecl> for FieldSignature {
    fn from(decl: &FieldDecl) -> Self {
        Self {
            name: decl.name.clone(),
            visibility: decl.visibility,
            storage: decl.storage,
            column: decl.column.clone(),
            inclusion: decl.inclusion,
            direction: decl.direction,
            key: decl.key,
        }
    }
}

/// Identity of a record shape inside a contract key.
///
/// A typed shape is identified by its record type and its declarations, so two
/// builders for one type with different annotations never share a contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeKey {
    Typed {
        type_id: TypeId,
        fields: Arc<[FieldSignature]>,
    },
    Dynamic,
}

impl ShapeKey {
    fn typed(shape: &TypedShape) -> Self {
        ShapeKey::Typed {
            type_id: shape.type_id,
            fields: shape.fields.iter().map(FieldSignature::from).collect(),
        }
    }
}

/// Everything a [`DataContract`](super::DataContract) depends on.
///
/// Keys built from equal components are interchangeable. A dynamic shape always
/// yields the canonical dynamic key: its policy is reset to the default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataContractKey {
    shape: ShapeKey,
    /// Literal column list; `None` for "derive from the shape".
    columns: Option<String>,
    policy: NamingPolicy,
}

/// `None`, blank and `*` all mean "no literal column list".
fn normalize_columns(columns: Option<&str>) -> Option<String> {
    columns
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != "*")
        .map(str::to_string)
}

impl DataContractKey {
    /// # Errors
    /// Returns `SqlMapperError::DynamicShapeOverride` when a dynamic shape is paired
    /// with a policy that redirects column names, directions or inclusion.
    pub fn new(
        shape: &RecordShape,
        columns: Option<&str>,
        policy: &NamingPolicy,
    ) -> Result<Self, SqlMapperError> {
        let columns = normalize_columns(columns);
        match shape {
            RecordShape::Dynamic => {
                if policy.has_overrides() {
                    return Err(SqlMapperError::DynamicShapeOverride(format!("{policy:?}")));
                }
                Ok(Self {
                    shape: ShapeKey::Dynamic,
                    columns,
                    policy: NamingPolicy::default(),
                })
            }
            RecordShape::Typed(typed) => Ok(Self {
                shape: ShapeKey::typed(typed),
                columns,
                policy: policy.clone(),
            }),
        }
    }

    #[must_use]
    pub fn shape(&self) -> &ShapeKey {
        &self.shape
    }

    #[must_use]
    pub fn columns(&self) -> Option<&str> {
        self.columns.as_deref()
    }

    #[must_use]
    pub fn policy(&self) -> &NamingPolicy {
        &self.policy
    }
}
