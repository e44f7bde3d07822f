use std::collections::HashMap;

use crate::engine::{Value, sql_err};

pub type Row = Vec<Value>;
pub type PartitionKey = String;

/// Rows of one table split across named partitions. The key list fixes
/// iteration order and survives truncation.
#[derive(Clone, Debug, Default)]
pub struct Partitions {
    keys: Vec<PartitionKey>,
    rows: HashMap<PartitionKey, Vec<Row>>,
}

impl Partitions {
    pub fn new(count: usize) -> Self {
        let keys: Vec<PartitionKey> = (0..count.max(1)).map(|i| i.to_string()).collect();
        let rows = keys.iter().map(|k| (k.clone(), Vec::new())).collect();
        Self { keys, rows }
    }

    pub fn keys(&self) -> &[PartitionKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn non_empty_keys(&self) -> Vec<PartitionKey> {
        self.keys
            .iter()
            .filter(|k| self.rows.get(*k).is_some_and(|r| !r.is_empty()))
            .cloned()
            .collect()
    }

    pub fn rows(&self, key: &str) -> anyhow::Result<&[Row]> {
        self.rows
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| partition_not_found(key))
    }

    pub fn rows_mut(&mut self, key: &str) -> anyhow::Result<&mut Vec<Row>> {
        self.rows.get_mut(key).ok_or_else(|| partition_not_found(key))
    }

    /// Copies the partition as it is now; later edits are not reflected.
    pub fn snapshot(&self, key: &str) -> anyhow::Result<Vec<Row>> {
        self.rows(key).map(<[Row]>::to_vec)
    }

    pub fn row_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn partition_row_count(&self, key: &str) -> anyhow::Result<usize> {
        self.rows(key).map(<[Row]>::len)
    }

    /// Clears every partition and returns how many rows were removed.
    pub fn truncate(&mut self) -> usize {
        let removed = self.row_count();
        for rows in self.rows.values_mut() {
            rows.clear();
        }
        removed
    }

    // round-robin placement for new rows
    pub fn insert_key(&self) -> PartitionKey {
        let n = self.keys.len();
        self.keys[self.row_count() % n].clone()
    }

    pub fn push(&mut self, key: &str, row: Row) -> anyhow::Result<()> {
        self.rows_mut(key)?.push(row);
        Ok(())
    }

    /// First position holding a row equal to `row`, in key order.
    pub fn locate(&self, row: &[Value]) -> Option<(PartitionKey, usize)> {
        self.keys.iter().find_map(|k| {
            self.rows
                .get(k)?
                .iter()
                .position(|r| r.as_slice() == row)
                .map(|pos| (k.clone(), pos))
        })
    }

    pub fn remove_at(&mut self, key: &str, pos: usize) -> anyhow::Result<Row> {
        let rows = self.rows_mut(key)?;
        if pos >= rows.len() {
            return Err(sql_err("XX000", format!("row {pos} out of bounds in partition {key}")));
        }
        Ok(rows.remove(pos))
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        self.keys
            .iter()
            .filter_map(|k| self.rows.get(k))
            .flat_map(|rows| rows.iter())
    }

    pub fn rows_mut_all(&mut self) -> impl Iterator<Item = &mut Row> {
        let order = &self.keys;
        let mut parts: Vec<(usize, &mut Vec<Row>)> = self
            .rows
            .iter_mut()
            .map(|(k, rows)| (order.iter().position(|o| o == k).unwrap_or(usize::MAX), rows))
            .collect();
        parts.sort_by_key(|(pos, _)| *pos);
        parts.into_iter().flat_map(|(_, rows)| rows.iter_mut())
    }

    /// Rewrites every row; the first error aborts and leaves `self` untouched.
    pub fn try_map_rows(
        &mut self,
        mut f: impl FnMut(&Row) -> anyhow::Result<Row>,
    ) -> anyhow::Result<()> {
        let mut next = HashMap::with_capacity(self.rows.len());
        for key in &self.keys {
            let Some(rows) = self.rows.get(key) else {
                continue;
            };
            let mapped = rows.iter().map(&mut f).collect::<anyhow::Result<Vec<_>>>()?;
            next.insert(key.clone(), mapped);
        }
        self.rows = next;
        Ok(())
    }
}

fn partition_not_found(key: &str) -> anyhow::Error {
    sql_err("42704", format!("partition not found {key}"))
}
