//! Data contracts: the resolved mapping between a record type and result columns.
//!
//! Record types declare their members once through [`ShapeBuilder`]. A
//! [`DataContractStore`] turns a shape, an optional literal column list and a
//! [`NamingPolicy`] into a shared [`DataContract`], deriving it at most once per
//! [`DataContractKey`].

mod direction;
mod key;
mod model;
mod policy;
mod shape;
mod store;
mod value;

pub use direction::{Direction, Visibility};
pub use key::{DataContractKey, FieldSignature, ShapeKey};
pub use model::{DataContract, FieldDescriptor};
pub use policy::{ColumnNameFn, DirectionFn, IgnoreFn, NamingPolicy};
pub use shape::{FieldDecl, RecordShape, ShapeBuilder, TypedShape};
pub use store::DataContractStore;
pub use value::FieldValue;
