use std::ops::Bound;

use tracing::trace;

use super::{Table, TableData};
use crate::capabilities::IndexAddressableTable;
use crate::editor::primary_key_index;
use crate::engine::{
    BoundingBox, Predicate, RowIter, SortSpec, SpatialTableIter, TableIter, Value, sql_err,
};
use crate::index::{Index, IndexLookup, IndexRange, PRIMARY_KEY_INDEX, RowLocator};
use crate::session::Session;
use crate::storage::{PartitionKey, Row};

/// Restriction carried by a partition handle produced from an index lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum PartitionRange {
    Index { index: String, ranges: Vec<IndexRange> },
    Spatial { ord: usize, bbox: BoundingBox },
}

/// A partition as handed to the execution layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    key: PartitionKey,
    range: Option<PartitionRange>,
}

impl Partition {
    pub fn new(key: impl Into<PartitionKey>) -> Self {
        Self {
            key: key.into(),
            range: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn range(&self) -> Option<&PartitionRange> {
        self.range.as_ref()
    }
}

/// Per-partition index keys, each paired with an encoded locator for the row
/// it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionIndexKeyValues {
    pub key: PartitionKey,
    pub entries: Vec<(Vec<Value>, Vec<u8>)>,
}

pub(crate) enum ScanIter {
    Table(TableIter),
    Spatial(SpatialTableIter),
}

impl ScanIter {
    fn sort_by(&mut self, spec: &SortSpec) {
        match self {
            ScanIter::Table(it) => it.sort_by(spec),
            ScanIter::Spatial(it) => it.sort_by(spec),
        }
    }
}

impl RowIter for ScanIter {
    fn next(&mut self) -> anyhow::Result<Option<Row>> {
        match self {
            ScanIter::Table(it) => it.next(),
            ScanIter::Spatial(it) => it.next(),
        }
    }
}

fn resolve_index(data: &TableData, name: &str) -> anyhow::Result<Index> {
    let found = if name.eq_ignore_ascii_case(PRIMARY_KEY_INDEX) {
        primary_key_index(data)
    } else {
        data.indexes.get(name).cloned()
    };
    found.ok_or_else(|| {
        sql_err("42704", format!("index {name} does not exist on table {}", data.table_name))
    })
}

// lower bound supplies the min corner, upper bound the max corner
fn spatial_bbox(lookup: &IndexLookup) -> anyhow::Result<BoundingBox> {
    let range = lookup
        .ranges
        .first()
        .and_then(|r| r.columns.first())
        .ok_or_else(|| sql_err("42804", format!("spatial lookup on {} has no range", lookup.index)))?;
    let corner = |b: &Bound<Value>, unbounded: f64| -> anyhow::Result<(f64, f64, f64, f64)> {
        match b {
            Bound::Unbounded => Ok((unbounded, unbounded, unbounded, unbounded)),
            Bound::Included(Value::Geometry(g)) | Bound::Excluded(Value::Geometry(g)) => {
                Ok(g.bbox())
            }
            Bound::Included(other) | Bound::Excluded(other) => Err(sql_err(
                "42804",
                format!("spatial lookup bound {other} is not a geometry"),
            )),
        }
    };
    let (min_x, min_y, _, _) = corner(&range.lower, f64::NEG_INFINITY)?;
    let (_, _, max_x, max_y) = corner(&range.upper, f64::INFINITY)?;
    Ok(BoundingBox::new((min_x, min_y), (max_x, max_y)))
}

fn range_predicate(index: Index, ranges: Vec<IndexRange>) -> Predicate {
    Predicate::from_fn(format!("index range on {}", index.name), move |row| {
        Ok(index.matches_ranges(row, &ranges))
    })
}

impl Table {
    /// Partitions worth scanning: empty ones are skipped, and a driver lookup
    /// restricts each handle to its ranges.
    pub(crate) fn scan_partitions(&self, session: &Session) -> anyhow::Result<Vec<Partition>> {
        if let Some(lookup) = &self.lookup {
            return IndexedTable::new(self.clone(), lookup.clone()).partitions(session);
        }
        let data = self.session_data(session);
        let keys = data.read().partitions.non_empty_keys();
        Ok(keys.into_iter().map(Partition::new).collect())
    }

    /// Iterates a copy of the partition taken now, so later edits in the same
    /// session are not observed.
    pub(crate) fn scan_partition(
        &self,
        session: &Session,
        partition: &Partition,
    ) -> anyhow::Result<ScanIter> {
        let data = self.session_data(session);
        let data = data.read();
        let rows = data.partitions.snapshot(partition.key())?;
        let mut filters = self.filters.clone();
        match partition.range() {
            None => Ok(ScanIter::Table(TableIter::new(rows, self.columns.clone(), filters))),
            Some(PartitionRange::Index { index, ranges }) => {
                let index = resolve_index(&data, index)?;
                filters.push(range_predicate(index, ranges.clone()));
                Ok(ScanIter::Table(TableIter::new(rows, self.columns.clone(), filters)))
            }
            Some(PartitionRange::Spatial { ord, bbox }) => Ok(ScanIter::Spatial(
                SpatialTableIter::new(rows, *ord, self.columns.clone(), *bbox).with_filters(filters),
            )),
        }
    }
}

/// A table read through one index: only rows inside the lookup ranges are
/// returned, ordered by the index key.
#[derive(Clone, Debug)]
pub struct IndexedTable {
    table: Table,
    lookup: IndexLookup,
}

impl IndexedTable {
    pub fn new(table: Table, lookup: IndexLookup) -> Self {
        Self { table, lookup }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn lookup(&self) -> &IndexLookup {
        &self.lookup
    }

    pub fn partitions(&self, session: &Session) -> anyhow::Result<Vec<Partition>> {
        let data = self.table.session_data(session);
        let data = data.read();
        let index = resolve_index(&data, &self.lookup.index)?;
        let range = if index.spatial {
            let ord = index.ordinals().first().copied().ok_or_else(|| {
                sql_err("XX000", format!("spatial index {} has no column", index.name))
            })?;
            PartitionRange::Spatial {
                ord,
                bbox: spatial_bbox(&self.lookup)?,
            }
        } else {
            PartitionRange::Index {
                index: index.name.clone(),
                ranges: self.lookup.ranges.clone(),
            }
        };
        trace!(table = %self.table.name(), index = %index.name, "index lookup");
        Ok(data
            .partitions
            .non_empty_keys()
            .into_iter()
            .map(|key| Partition {
                key,
                range: Some(range.clone()),
            })
            .collect())
    }

    /// Rows of `partition` inside the lookup, stably sorted by the index
    /// expressions (descending when the lookup is reversed).
    pub fn partition_rows(
        &self,
        session: &Session,
        partition: &Partition,
    ) -> anyhow::Result<Box<dyn RowIter>> {
        let ordinals = {
            let data = self.table.session_data(session);
            let data = data.read();
            resolve_index(&data, &self.lookup.index)?.ordinals()
        };
        let mut iter = self.table.scan_partition(session, partition)?;
        iter.sort_by(&SortSpec {
            ordinals,
            reverse: self.lookup.reverse,
        });
        Ok(Box::new(iter))
    }
}

impl IndexAddressableTable for Table {
    fn indexes(&self, session: &Session) -> Vec<Index> {
        let data = self.session_data(session);
        let data = data.read();
        let pk = data
            .primary_key_indexes
            .then(|| primary_key_index(&data))
            .flatten();
        pk.into_iter().chain(data.indexes.iter().cloned()).collect()
    }

    fn indexed_access(&self, lookup: IndexLookup) -> IndexedTable {
        IndexedTable::new(self.clone(), lookup)
    }

    fn index_key_values(
        &self,
        session: &Session,
        columns: &[String],
    ) -> anyhow::Result<Vec<PartitionIndexKeyValues>> {
        let data = self.session_data(session);
        let data = data.read();
        let ordinals = data.schema.column_indexes(columns)?;
        let mut out = Vec::with_capacity(data.partitions.len());
        for key in data.partitions.keys() {
            let rows = data.partitions.rows(key)?;
            let mut entries = Vec::with_capacity(rows.len());
            for (pos, row) in rows.iter().enumerate() {
                let values = ordinals.iter().map(|&o| row[o].clone()).collect();
                entries.push((values, RowLocator::new(key.clone(), pos).encode()?));
            }
            out.push(PartitionIndexKeyValues {
                key: key.clone(),
                entries,
            });
        }
        Ok(out)
    }

    fn row_by_locator(&self, session: &Session, locator: &[u8]) -> anyhow::Result<Row> {
        let loc = RowLocator::decode(locator)?;
        let data = self.session_data(session);
        let data = data.read();
        data.partitions
            .rows(&loc.key)?
            .get(loc.pos)
            .cloned()
            .ok_or_else(|| {
                sql_err("42704", format!("no row at {} in partition {}", loc.pos, loc.key))
            })
    }
}
