//! Table metadata: catalog rows normalised per dialect and cached per table.

mod column;
mod store;

pub use column::ColumnMetadata;
pub use store::{TableMetadataKey, TableMetadataStore};
