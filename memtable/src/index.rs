use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::catalog::Schema;
use crate::engine::{DataType, Value, compare_values, sql_err};
use crate::fulltext::FulltextInfo;
use crate::storage::Row;

/// Name of the synthesized primary key index.
pub const PRIMARY_KEY_INDEX: &str = "PRIMARY";

/// Column reference inside an index, bound to an ordinal of the owning schema.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexExpr {
    pub index: usize,
    pub table: String,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub exprs: Vec<IndexExpr>,
    pub unique: bool,
    pub spatial: bool,
    pub fulltext: bool,
    /// Empty unless at least one column carries a prefix length.
    pub prefix_lengths: Vec<u16>,
    pub comment: String,
    pub fulltext_info: Option<FulltextInfo>,
}

impl Index {
    pub fn id(&self) -> &str {
        &self.name
    }

    pub fn column_names(&self) -> Vec<String> {
        self.exprs.iter().map(|e| e.name.clone()).collect()
    }

    pub fn ordinals(&self) -> Vec<usize> {
        self.exprs.iter().map(|e| e.index).collect()
    }

    pub fn prefix_length(&self, i: usize) -> u16 {
        self.prefix_lengths.get(i).copied().unwrap_or(0)
    }

    pub fn references_column(&self, name: &str) -> bool {
        self.exprs.iter().any(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Projects `row` onto the index columns, truncating prefixed values.
    pub fn key(&self, row: &[Value]) -> Vec<Value> {
        self.exprs
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let v = row.get(e.index).cloned().unwrap_or(Value::Null);
                apply_prefix(v, self.prefix_length(i))
            })
            .collect()
    }

    /// Re-points every expression at its column's ordinal in `schema`.
    /// Returns false when a referenced column no longer exists.
    pub fn rebind(&mut self, schema: &Schema) -> bool {
        for e in &mut self.exprs {
            let Some(ord) = schema.index_of(&e.name) else {
                return false;
            };
            let col = &schema.columns[ord];
            e.index = ord;
            e.name = col.name.clone();
            e.data_type = col.data_type.clone();
            e.nullable = col.nullable;
        }
        true
    }

    pub fn matches_ranges(&self, row: &[Value], ranges: &[IndexRange]) -> bool {
        ranges.iter().any(|r| r.contains(&self.key(row)))
    }
}

fn apply_prefix(v: Value, len: u16) -> Value {
    if len == 0 {
        return v;
    }
    match v {
        Value::Text(s) => Value::Text(s.chars().take(len as usize).collect()),
        Value::Bytes(mut b) => {
            b.truncate(len as usize);
            Value::Bytes(b)
        }
        other => other,
    }
}

/// Secondary indexes of one table, iterated in name order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexSet {
    indexes: BTreeMap<String, Index>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Index> {
        self.indexes.values_mut()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes
            .get(name)
            .or_else(|| self.iter().find(|i| i.name.eq_ignore_ascii_case(name)))
    }

    pub fn insert(&mut self, index: Index) -> anyhow::Result<()> {
        if let Some(existing) = self.resolve(&index.name) {
            return Err(sql_err("42P07", format!("index {existing} already exists")));
        }
        self.indexes.insert(index.name.clone(), index);
        Ok(())
    }

    pub fn drop(&mut self, name: &str) -> anyhow::Result<Index> {
        let key = self
            .resolve(name)
            .ok_or_else(|| sql_err("42704", format!("index {name} does not exist")))?;
        self.indexes
            .remove(&key)
            .ok_or_else(|| sql_err("XX000", format!("index {key} vanished during drop")))
    }

    pub fn rename(&mut self, from: &str, to: &str) -> anyhow::Result<()> {
        if from == to {
            return Ok(());
        }
        let key = self
            .resolve(from)
            .ok_or_else(|| sql_err("42704", format!("index {from} does not exist")))?;
        if let Some(existing) = self.resolve(to)
            && existing != key
        {
            return Err(sql_err("42P07", format!("index {to} already exists")));
        }
        if let Some(mut idx) = self.indexes.remove(&key) {
            idx.name = to.to_string();
            self.indexes.insert(to.to_string(), idx);
        }
        Ok(())
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Index) -> bool) {
        self.indexes.retain(|_, idx| keep(idx));
    }

    pub fn unique(&self) -> impl Iterator<Item = &Index> {
        self.iter().filter(|i| i.unique)
    }

    pub fn fulltext(&self) -> impl Iterator<Item = &Index> {
        self.iter().filter(|i| i.fulltext)
    }

    fn resolve(&self, name: &str) -> Option<String> {
        if self.indexes.contains_key(name) {
            return Some(name.to_string());
        }
        self.indexes
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
    }
}

/// Opaque handle to a row: partition key plus offset at encoding time.
/// Invalidated by any structural change to the partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLocator {
    pub key: String,
    pub pos: usize,
}

impl RowLocator {
    pub fn new(key: impl Into<String>, pos: usize) -> Self {
        Self {
            key: key.into(),
            pos,
        }
    }

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| sql_err("XX000", format!("failed to encode row locator: {e}")))
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| sql_err("XX000", format!("failed to decode row locator: {e}")))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRange {
    pub lower: Bound<Value>,
    pub upper: Bound<Value>,
}

impl ColumnRange {
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub fn point(v: Value) -> Self {
        Self {
            lower: Bound::Included(v.clone()),
            upper: Bound::Included(v),
        }
    }

    pub fn closed(lo: Value, hi: Value) -> Self {
        Self {
            lower: Bound::Included(lo),
            upper: Bound::Included(hi),
        }
    }

    fn contains(&self, v: &Value) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(lo) => {
                matches!(compare_values(v, lo), Some(Ordering::Greater | Ordering::Equal))
            }
            Bound::Excluded(lo) => matches!(compare_values(v, lo), Some(Ordering::Greater)),
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(hi) => {
                matches!(compare_values(v, hi), Some(Ordering::Less | Ordering::Equal))
            }
            Bound::Excluded(hi) => matches!(compare_values(v, hi), Some(Ordering::Less)),
        };
        above && below
    }
}

/// One conjunction of per-column ranges, aligned with the index expressions.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRange {
    pub columns: Vec<ColumnRange>,
}

impl IndexRange {
    pub fn new(columns: Vec<ColumnRange>) -> Self {
        Self { columns }
    }

    fn contains(&self, key: &[Value]) -> bool {
        self.columns
            .iter()
            .zip(key)
            .all(|(range, v)| range.contains(v))
    }
}

/// Index access requested by the planner; ranges are OR-ed together.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexLookup {
    pub index: String,
    pub ranges: Vec<IndexRange>,
    pub reverse: bool,
}

impl IndexLookup {
    pub fn new(index: impl Into<String>, ranges: Vec<IndexRange>) -> Self {
        Self {
            index: index.into(),
            ranges,
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

pub(crate) fn has_null(row: &Row, ordinals: &[usize]) -> bool {
    ordinals
        .iter()
        .any(|&o| row.get(o).is_none_or(Value::is_null))
}
