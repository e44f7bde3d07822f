use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::capabilities::*;
use crate::catalog::{Collation, Schema, TableId};
use crate::database::DatabaseHandle;
use crate::editor::TableEditor;
use crate::engine::{Predicate, RowIter, Value};
use crate::index::IndexLookup;
use crate::session::{OverlayEpoch, Session};
use crate::storage::Row;

mod data;
mod rewrite;
mod scan;
mod schema_ddl;
mod stats;

pub use data::TableData;
pub use scan::{IndexedTable, Partition, PartitionIndexKeyValues, PartitionRange};
pub use stats::{Histogram, HistogramBucket, TableStatistics};

/// Handle to one table. Cloning is cheap; clones share the baseline data.
#[derive(Clone)]
pub struct Table {
    id: TableId,
    name: String,
    data: Arc<RwLock<TableData>>,
    db: DatabaseHandle,
    ignore_session_data: bool,
    projection: Option<Vec<String>>,
    columns: Option<Vec<usize>>,
    filters: Vec<Predicate>,
    lookup: Option<IndexLookup>,
    stats: Arc<RwLock<Option<TableStatistics>>>,
}

impl Table {
    pub(crate) fn new(
        id: TableId,
        name: &str,
        data: TableData,
        db: DatabaseHandle,
        ignore_session_data: bool,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            data: Arc::new(RwLock::new(data)),
            db,
            ignore_session_data,
            projection: None,
            columns: None,
            filters: Vec::new(),
            lookup: None,
            stats: Arc::new(RwLock::new(None)),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &DatabaseHandle {
        &self.db
    }

    pub fn ignore_session_data(&self) -> bool {
        self.ignore_session_data
    }

    /// The data this session sees: the shared baseline for local tables,
    /// otherwise the session's overlay, cloned on first use.
    pub fn session_data(&self, session: &Session) -> Arc<RwLock<TableData>> {
        if self.ignore_session_data {
            return self.data.clone();
        }
        session.get_or_clone(self.id, &self.data)
    }

    /// Overlay generation an edit of this table depends on; local tables
    /// write straight to the baseline and depend on none.
    pub(crate) fn session_epoch(&self, session: &Session) -> Option<OverlayEpoch> {
        (!self.ignore_session_data).then(|| session.epoch())
    }

    pub(crate) fn baseline(&self) -> &Arc<RwLock<TableData>> {
        &self.data
    }

    pub(crate) fn publish(&self, session: &Session, data: TableData) {
        if self.ignore_session_data {
            self.data.write().install(data);
        } else {
            session.publish(self.id, &self.data, data);
        }
    }

    /// Runs `f` against this session's data under a write lock.
    pub(crate) fn with_session_data<T>(
        &self,
        session: &Session,
        f: impl FnOnce(&mut TableData) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let data = self.session_data(session);
        let mut guard = data.write();
        guard.revision += 1;
        f(&mut guard)
    }

    /// Applies `f` to a copy of the session data and keeps the copy only when
    /// `f` succeeds.
    pub(crate) fn alter_session_data<T>(
        &self,
        session: &Session,
        f: impl FnOnce(&mut TableData) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let data = self.session_data(session);
        let mut guard = data.write();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        guard.install(next);
        Ok(out)
    }

    pub fn rows(&self, session: &Session) -> Vec<Row> {
        self.session_data(session).read().rows().cloned().collect()
    }

    /// Inserts one row in its own edit scope.
    pub fn insert(&self, session: &Session, row: Row) -> anyhow::Result<()> {
        let mut editor = self.inserter(session)?;
        editor.insert(row)?;
        editor.close()
    }

    pub fn enable_primary_key_indexes(&self, session: &Session) {
        let mut baseline = self.data.write();
        baseline.primary_key_indexes = true;
        baseline.revision += 1;
        drop(baseline);
        if let Some(overlay) = session.overlay(self.id) {
            let mut overlay = overlay.write();
            overlay.primary_key_indexes = true;
            overlay.revision += 1;
        }
    }

    pub fn with_filters(&self, filters: Vec<Predicate>) -> Table {
        if filters.is_empty() {
            return self.clone();
        }
        let mut nt = self.clone();
        nt.filters = filters;
        nt
    }

    pub fn with_projections(
        &self,
        session: &Session,
        cols: Option<&[String]>,
    ) -> anyhow::Result<Table> {
        let mut nt = self.clone();
        match cols {
            None => {
                nt.projection = None;
                nt.columns = None;
            }
            Some(cols) => {
                let columns = self.session_data(session).read().schema.column_indexes(cols)?;
                nt.columns = Some(columns);
                nt.projection = Some(cols.to_vec());
            }
        }
        Ok(nt)
    }

    /// Restricts scans to rows matching a driver-supplied lookup. An existing
    /// lookup is kept.
    pub fn with_driver_index_lookup(&self, lookup: IndexLookup) -> Table {
        if self.lookup.is_some() {
            return self.clone();
        }
        let mut nt = self.clone();
        nt.lookup = Some(lookup);
        nt
    }

    pub fn projected_schema(&self, session: &Session) -> Schema {
        let data = self.session_data(session);
        let data = data.read();
        match &self.columns {
            Some(cols) => Schema::with_pk_ordinals(
                cols.iter().map(|&c| data.schema.columns[c].clone()).collect(),
                Vec::new(),
            ),
            None => data.schema.clone(),
        }
    }

    pub fn debug_string(&self) -> String {
        let mut children = vec![format!("name: {}", self.name)];
        if let Some(lookup) = &self.lookup {
            children.push(format!("index: {}", lookup.index));
        }
        if let Some(cols) = &self.columns {
            let cols: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
            children.push(format!("projections: [{}]", cols.join(", ")));
        }
        if !self.filters.is_empty() {
            let filters: Vec<String> = self.filters.iter().map(|f| f.describe()).collect();
            children.push(format!("filters: [{}]", filters.join(", ")));
        }
        let mut out = String::from("Table\n");
        for (i, child) in children.iter().enumerate() {
            let branch = if i + 1 == children.len() { "└─" } else { "├─" };
            out.push_str(&format!(" {branch} {child}\n"));
        }
        out
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("projection", &self.projection)
            .field("filters", &self.filters)
            .field("lookup", &self.lookup)
            .finish()
    }
}

impl StorageTable for Table {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self, session: &Session) -> Schema {
        self.session_data(session).read().schema.clone()
    }

    fn collation(&self, session: &Session) -> Collation {
        self.session_data(session).read().collation
    }

    fn partitions(&self, session: &Session) -> anyhow::Result<Vec<Partition>> {
        self.scan_partitions(session)
    }

    fn partition_count(&self, session: &Session) -> usize {
        self.session_data(session).read().partitions.len()
    }

    fn partition_row_count(
        &self,
        session: &Session,
        partition: &Partition,
    ) -> anyhow::Result<usize> {
        self.session_data(session)
            .read()
            .partitions
            .partition_row_count(partition.key())
    }

    fn partition_rows(
        &self,
        session: &Session,
        partition: &Partition,
    ) -> anyhow::Result<Box<dyn RowIter>> {
        Ok(Box::new(self.scan_partition(session, partition)?))
    }

    fn as_insertable(&self) -> Option<&dyn InsertableTable> {
        Some(self)
    }
    fn as_updatable(&self) -> Option<&dyn UpdatableTable> {
        Some(self)
    }
    fn as_deletable(&self) -> Option<&dyn DeletableTable> {
        Some(self)
    }
    fn as_replaceable(&self) -> Option<&dyn ReplaceableTable> {
        Some(self)
    }
    fn as_truncateable(&self) -> Option<&dyn TruncateableTable> {
        Some(self)
    }
    fn as_auto_increment(&self) -> Option<&dyn AutoIncrementTable> {
        Some(self)
    }
    fn as_alterable(&self) -> Option<&dyn AlterableTable> {
        Some(self)
    }
    fn as_index_alterable(&self) -> Option<&dyn IndexAlterableTable> {
        Some(self)
    }
    fn as_index_addressable(&self) -> Option<&dyn IndexAddressableTable> {
        Some(self)
    }
    fn as_foreign_key(&self) -> Option<&dyn ForeignKeyTable> {
        Some(self)
    }
    fn as_check_alterable(&self) -> Option<&dyn CheckAlterableTable> {
        Some(self)
    }
    fn as_primary_key_alterable(&self) -> Option<&dyn PrimaryKeyAlterableTable> {
        Some(self)
    }
    fn as_rewritable(&self) -> Option<&dyn RewritableTable> {
        Some(self)
    }
    fn as_statistics(&self) -> Option<&dyn StatisticsTable> {
        Some(self)
    }
    fn as_projected(&self) -> Option<&dyn ProjectedTable> {
        Some(self)
    }
    fn as_filtered(&self) -> Option<&dyn FilteredTable> {
        Some(self)
    }
    fn as_collation_alterable(&self) -> Option<&dyn CollationAlterableTable> {
        Some(self)
    }
}

impl InsertableTable for Table {
    fn inserter(&self, session: &Session) -> anyhow::Result<TableEditor> {
        TableEditor::for_table(self, session)
    }
}

impl UpdatableTable for Table {
    fn updater(&self, session: &Session) -> anyhow::Result<TableEditor> {
        TableEditor::for_table(self, session)
    }
}

impl DeletableTable for Table {
    fn deleter(&self, session: &Session) -> anyhow::Result<TableEditor> {
        TableEditor::for_table(self, session)
    }
}

impl ReplaceableTable for Table {
    fn replacer(&self, session: &Session) -> anyhow::Result<TableEditor> {
        TableEditor::for_table(self, session)
    }
}

impl TruncateableTable for Table {
    fn truncate(&self, session: &Session) -> anyhow::Result<usize> {
        self.with_session_data(session, |data| {
            let schema = data.schema.clone();
            Ok(data.truncate(schema))
        })
    }
}

impl AutoIncrementTable for Table {
    fn peek_next_auto_increment_value(&self, session: &Session) -> u64 {
        self.session_data(session).read().auto_inc_val
    }

    fn next_auto_increment_value(
        &self,
        session: &Session,
        insert_val: &Value,
    ) -> anyhow::Result<u64> {
        self.with_session_data(session, |data| {
            if data.has_auto_increment() {
                data.raise_auto_increment(insert_val)?;
            }
            Ok(data.auto_inc_val)
        })
    }

    fn auto_increment_setter(&self, session: &Session) -> anyhow::Result<TableEditor> {
        TableEditor::for_table(self, session)
    }
}

impl ProjectedTable for Table {
    fn projections(&self) -> Option<Vec<String>> {
        self.projection.clone()
    }
}

impl FilteredTable for Table {
    fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    fn handled_filters(&self, session: &Session, filters: &[Predicate]) -> Vec<Predicate> {
        let schema = self.schema(session);
        filters
            .iter()
            .filter(|f| {
                let cols = f.columns();
                !cols.is_empty()
                    && cols.iter().all(|(table, col)| {
                        table.eq_ignore_ascii_case(&self.name) && schema.index_of(col).is_some()
                    })
            })
            .cloned()
            .collect()
    }
}
