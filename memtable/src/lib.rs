pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod database;
pub mod editor;
pub mod engine;
pub mod foreign_keys;
pub mod fulltext;
pub mod index;
pub mod session;
pub mod storage;
pub mod table;

pub use capabilities::*;
pub use catalog::{
    CheckDefinition, Collation, Column, ColumnOrder, ForeignKeyConstraint, IndexColumn,
    IndexConstraint, IndexDef, Schema, TableId,
};
pub use config::StorageConfig;
pub use database::{Database, DatabaseHandle, DatabaseProvider, TableOptions};
pub use editor::TableEditor;
pub use engine::{DataType, ErrorKind, Geometry, SqlError, Value, error_kind};
pub use index::{ColumnRange, Index, IndexLookup, IndexRange, PRIMARY_KEY_INDEX, RowLocator};
pub use session::{Session, SessionId, SessionManager};
pub use storage::{PartitionKey, Partitions, Row};
pub use table::{Table, TableData};
