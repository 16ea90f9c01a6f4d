//! Managed, schema-enforced tables stored as Parquet part files plus a commit log.

pub mod query;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod table;
pub mod utils;

pub use query::TableQuery;
pub use schema::{ColumnSpec, TableMetadata};
pub use storage::{ObjectStorage, ObjectStoreStorage, open_warehouse};
pub use table::{CommitEntry, DataFile, Operation, TableSnapshot, TableStore};
pub use utils::paths::QualifiedName;
