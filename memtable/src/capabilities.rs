//! Optional behaviours a table may support. Collaborators probe for a
//! capability through the `as_*` accessors on [`StorageTable`] before using it.

use crate::catalog::{
    CheckDefinition, Collation, Column, ColumnOrder, ForeignKeyConstraint, IndexColumn, IndexDef,
    Schema,
};
use crate::editor::TableEditor;
use crate::engine::{Predicate, RowIter, Value};
use crate::fulltext::{FulltextTableNames, KeyColumns};
use crate::index::{Index, IndexLookup};
use crate::session::Session;
use crate::storage::Row;
use crate::table::{IndexedTable, Partition, PartitionIndexKeyValues, TableStatistics};

pub trait StorageTable: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self, session: &Session) -> Schema;
    fn collation(&self, session: &Session) -> Collation;
    fn partitions(&self, session: &Session) -> anyhow::Result<Vec<Partition>>;
    fn partition_count(&self, session: &Session) -> usize;
    fn partition_row_count(&self, session: &Session, partition: &Partition)
    -> anyhow::Result<usize>;
    fn partition_rows(
        &self,
        session: &Session,
        partition: &Partition,
    ) -> anyhow::Result<Box<dyn RowIter>>;

    fn as_insertable(&self) -> Option<&dyn InsertableTable> {
        None
    }
    fn as_updatable(&self) -> Option<&dyn UpdatableTable> {
        None
    }
    fn as_deletable(&self) -> Option<&dyn DeletableTable> {
        None
    }
    fn as_replaceable(&self) -> Option<&dyn ReplaceableTable> {
        None
    }
    fn as_truncateable(&self) -> Option<&dyn TruncateableTable> {
        None
    }
    fn as_auto_increment(&self) -> Option<&dyn AutoIncrementTable> {
        None
    }
    fn as_alterable(&self) -> Option<&dyn AlterableTable> {
        None
    }
    fn as_index_alterable(&self) -> Option<&dyn IndexAlterableTable> {
        None
    }
    fn as_index_addressable(&self) -> Option<&dyn IndexAddressableTable> {
        None
    }
    fn as_foreign_key(&self) -> Option<&dyn ForeignKeyTable> {
        None
    }
    fn as_check_alterable(&self) -> Option<&dyn CheckAlterableTable> {
        None
    }
    fn as_primary_key_alterable(&self) -> Option<&dyn PrimaryKeyAlterableTable> {
        None
    }
    fn as_rewritable(&self) -> Option<&dyn RewritableTable> {
        None
    }
    fn as_statistics(&self) -> Option<&dyn StatisticsTable> {
        None
    }
    fn as_projected(&self) -> Option<&dyn ProjectedTable> {
        None
    }
    fn as_filtered(&self) -> Option<&dyn FilteredTable> {
        None
    }
    fn as_collation_alterable(&self) -> Option<&dyn CollationAlterableTable> {
        None
    }
}

pub trait InsertableTable {
    fn inserter(&self, session: &Session) -> anyhow::Result<TableEditor>;
}

pub trait UpdatableTable {
    fn updater(&self, session: &Session) -> anyhow::Result<TableEditor>;
}

pub trait DeletableTable {
    fn deleter(&self, session: &Session) -> anyhow::Result<TableEditor>;
}

pub trait ReplaceableTable {
    fn replacer(&self, session: &Session) -> anyhow::Result<TableEditor>;
}

pub trait TruncateableTable {
    fn truncate(&self, session: &Session) -> anyhow::Result<usize>;
}

pub trait AutoIncrementTable {
    fn peek_next_auto_increment_value(&self, session: &Session) -> u64;
    fn next_auto_increment_value(&self, session: &Session, insert_val: &Value)
    -> anyhow::Result<u64>;
    fn auto_increment_setter(&self, session: &Session) -> anyhow::Result<TableEditor>;
}

pub trait AlterableTable {
    fn add_column(
        &self,
        session: &Session,
        column: Column,
        order: Option<&ColumnOrder>,
    ) -> anyhow::Result<()>;
    fn drop_column(&self, session: &Session, name: &str) -> anyhow::Result<()>;
    fn modify_column(
        &self,
        session: &Session,
        name: &str,
        column: Column,
        order: Option<&ColumnOrder>,
    ) -> anyhow::Result<()>;
}

pub trait IndexAlterableTable {
    fn create_index(&self, session: &Session, def: IndexDef) -> anyhow::Result<()>;
    fn drop_index(&self, session: &Session, name: &str) -> anyhow::Result<()>;
    fn rename_index(&self, session: &Session, from: &str, to: &str) -> anyhow::Result<()>;
    fn create_fulltext_index(
        &self,
        session: &Session,
        def: IndexDef,
        key_columns: KeyColumns,
        tables: FulltextTableNames,
    ) -> anyhow::Result<()>;
}

pub trait IndexAddressableTable {
    fn indexes(&self, session: &Session) -> Vec<Index>;
    fn indexed_access(&self, lookup: IndexLookup) -> IndexedTable;
    fn index_key_values(
        &self,
        session: &Session,
        columns: &[String],
    ) -> anyhow::Result<Vec<PartitionIndexKeyValues>>;
    fn row_by_locator(&self, session: &Session, locator: &[u8]) -> anyhow::Result<Row>;
}

pub trait ForeignKeyTable {
    fn declared_foreign_keys(&self, session: &Session) -> Vec<ForeignKeyConstraint>;
    fn referenced_foreign_keys(&self, session: &Session) -> Vec<ForeignKeyConstraint>;
    fn add_foreign_key(&self, session: &Session, fk: ForeignKeyConstraint) -> anyhow::Result<()>;
    fn drop_foreign_key(&self, session: &Session, name: &str) -> anyhow::Result<()>;
    fn update_foreign_key(
        &self,
        session: &Session,
        name: &str,
        fk: ForeignKeyConstraint,
    ) -> anyhow::Result<()>;
    fn set_foreign_key_resolved(&self, session: &Session, name: &str) -> anyhow::Result<()>;
    fn create_index_for_foreign_key(&self, session: &Session, def: IndexDef)
    -> anyhow::Result<()>;
    fn foreign_key_editor(&self, session: &Session) -> anyhow::Result<TableEditor>;
}

pub trait CheckAlterableTable {
    fn checks(&self, session: &Session) -> Vec<CheckDefinition>;
    fn create_check(&self, session: &Session, check: CheckDefinition) -> anyhow::Result<()>;
    fn drop_check(&self, session: &Session, name: &str) -> anyhow::Result<()>;
}

pub trait PrimaryKeyAlterableTable {
    fn primary_key_schema(&self, session: &Session) -> Schema;
    fn create_primary_key(&self, session: &Session, columns: &[IndexColumn])
    -> anyhow::Result<()>;
    fn drop_primary_key(&self, session: &Session) -> anyhow::Result<()>;
}

pub trait RewritableTable {
    fn should_rewrite(
        &self,
        old_schema: &Schema,
        new_schema: &Schema,
        old_column: Option<&Column>,
        new_column: Option<&Column>,
    ) -> bool;
    fn rewrite_inserter(
        &self,
        session: &Session,
        old_schema: &Schema,
        new_schema: &Schema,
        old_column: Option<&Column>,
        new_column: Option<&Column>,
        index_columns: &[IndexColumn],
    ) -> anyhow::Result<TableEditor>;
}

pub trait StatisticsTable {
    fn analyze_table(&self, session: &Session) -> anyhow::Result<()>;
    fn statistics(&self) -> Option<TableStatistics>;
    fn data_length(&self, session: &Session) -> u64;
    fn row_count(&self, session: &Session) -> u64;
}

pub trait ProjectedTable {
    fn projections(&self) -> Option<Vec<String>>;
}

pub trait FilteredTable {
    fn filters(&self) -> &[Predicate];
    fn handled_filters(&self, session: &Session, filters: &[Predicate]) -> Vec<Predicate>;
}

pub trait CollationAlterableTable {
    fn modify_stored_collation(&self, session: &Session, collation: Collation)
    -> anyhow::Result<()>;
    fn modify_default_collation(
        &self,
        session: &Session,
        collation: Collation,
    ) -> anyhow::Result<()>;
}
