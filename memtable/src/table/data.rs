use crate::catalog::{CheckDefinition, Collation, Schema};
use crate::engine::{Value, sql_err};
use crate::foreign_keys::ForeignKeyCollection;
use crate::index::IndexSet;
use crate::storage::{Partitions, Row};

/// Everything one table holds: schema, rows, indexes and constraints. The
/// database owns a baseline copy; sessions edit private clones of it.
#[derive(Clone, Debug)]
pub struct TableData {
    pub(crate) db_name: String,
    pub(crate) table_name: String,
    pub(crate) schema: Schema,
    pub(crate) collation: Collation,
    pub(crate) partitions: Partitions,
    pub(crate) indexes: IndexSet,
    pub(crate) fk_coll: ForeignKeyCollection,
    pub(crate) checks: Vec<CheckDefinition>,
    // next value to hand out; 0 when the table has no auto-increment column
    pub(crate) auto_inc_val: u64,
    pub(crate) auto_col_idx: Option<usize>,
    pub(crate) fulltext_config_table: Option<String>,
    pub(crate) primary_key_indexes: bool,
    // bumped whenever the state behind a shared slot is replaced or altered
    pub(crate) revision: u64,
}

impl TableData {
    pub(crate) fn new(
        db_name: &str,
        table_name: &str,
        schema: Schema,
        partitions: usize,
        collation: Collation,
    ) -> Self {
        let mut data = Self {
            db_name: db_name.to_string(),
            table_name: table_name.to_string(),
            schema: Schema::default(),
            collation,
            partitions: Partitions::new(partitions),
            indexes: IndexSet::new(),
            fk_coll: ForeignKeyCollection::new(),
            checks: Vec::new(),
            auto_inc_val: 0,
            auto_col_idx: None,
            fulltext_config_table: None,
            primary_key_indexes: false,
            revision: 0,
        };
        data.set_schema(schema);
        data
    }

    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// Replaces this state with `next` as its successor revision.
    pub(crate) fn install(&mut self, mut next: TableData) {
        next.revision = self.revision + 1;
        *self = next;
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    pub fn indexes(&self) -> &IndexSet {
        &self.indexes
    }

    pub fn foreign_keys(&self) -> &ForeignKeyCollection {
        &self.fk_coll
    }

    pub fn checks(&self) -> &[CheckDefinition] {
        &self.checks
    }

    pub fn row_count(&self) -> usize {
        self.partitions.row_count()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.partitions.iter_rows()
    }

    // stamps ownership onto the columns and resets the sequence to match
    fn set_schema(&mut self, mut schema: Schema) {
        for col in &mut schema.columns {
            col.source = self.table_name.clone();
        }
        for &ord in &schema.pk_ordinals {
            if let Some(col) = schema.columns.get_mut(ord) {
                col.primary_key = true;
                col.nullable = false;
            }
        }
        self.auto_col_idx = schema.auto_increment_ordinal();
        self.auto_inc_val = u64::from(self.auto_col_idx.is_some());
        self.schema = schema;
    }

    /// Empties every partition and installs `schema`, which also resets the
    /// auto-increment sequence. Returns the number of rows removed.
    pub(crate) fn truncate(&mut self, schema: Schema) -> usize {
        let removed = self.partitions.truncate();
        self.set_schema(schema);
        removed
    }

    pub(crate) fn has_auto_increment(&self) -> bool {
        self.auto_col_idx.is_some()
    }

    /// Advances the sequence past an explicitly supplied value.
    pub(crate) fn observe_auto_increment(&mut self, v: &Value) -> anyhow::Result<()> {
        if let Some(n) = sequence_position(v)?
            && n >= self.auto_inc_val
        {
            self.auto_inc_val = n.saturating_add(1);
        }
        Ok(())
    }

    /// Moves the sequence up to `v` when it is ahead of it.
    pub(crate) fn raise_auto_increment(&mut self, v: &Value) -> anyhow::Result<()> {
        if let Some(n) = sequence_position(v)?
            && n > self.auto_inc_val
        {
            self.auto_inc_val = n;
        }
        Ok(())
    }

    /// Fills an omitted (null or zero) auto-increment value with the next
    /// number in the sequence; explicit positive values advance the sequence
    /// and negative ones are kept as given.
    pub(crate) fn assign_auto_increment(&mut self, row: &mut Row) -> anyhow::Result<()> {
        let Some(idx) = self.auto_col_idx else {
            return Ok(());
        };
        let Some(slot) = row.get_mut(idx) else {
            return Ok(());
        };
        match auto_increment_operand(slot)? {
            None | Some(0) => {
                let next = self.auto_inc_val.max(1);
                *slot = Value::Int64(i64::try_from(next).map_err(|_| {
                    sql_err("22003", format!("auto-increment value {next} out of range"))
                })?);
                self.auto_inc_val = next + 1;
            }
            Some(n) => {
                if let Ok(n) = u64::try_from(n)
                    && n >= self.auto_inc_val
                {
                    self.auto_inc_val = n.saturating_add(1);
                }
            }
        }
        Ok(())
    }

    /// Seeds the sequence for a freshly added auto-increment column: rows with
    /// no value are numbered, then the sequence continues past the maximum.
    pub(crate) fn seed_auto_increment(&mut self, idx: usize) -> anyhow::Result<()> {
        self.auto_col_idx = Some(idx);
        let mut max = 0u64;
        for row in self.partitions.iter_rows() {
            if let Some(n) = sequence_position(&row[idx])? {
                max = max.max(n);
            }
        }
        let mut next = max + 1;
        for row in self.partitions.rows_mut_all() {
            if matches!(auto_increment_operand(&row[idx])?, None | Some(0)) {
                row[idx] = Value::Int64(next as i64);
                next += 1;
            }
        }
        self.auto_inc_val = next;
        Ok(())
    }

    pub(crate) fn clear_auto_increment(&mut self) {
        self.auto_col_idx = None;
        self.auto_inc_val = 0;
    }
}

fn auto_increment_operand(v: &Value) -> anyhow::Result<Option<i64>> {
    match v {
        Value::Null => Ok(None),
        Value::Int64(i) => Ok(Some(*i)),
        Value::Float64Bits(bits) => Ok(Some(f64::from_bits(*bits).round() as i64)),
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| sql_err("42804", format!("invalid auto-increment value '{s}'"))),
        other => Err(sql_err("42804", format!("invalid auto-increment value {other}"))),
    }
}

/// The sequence value `v` occupies; omitted and negative values occupy none.
fn sequence_position(v: &Value) -> anyhow::Result<Option<u64>> {
    Ok(auto_increment_operand(v)?.and_then(|n| u64::try_from(n).ok().filter(|n| *n > 0)))
}
