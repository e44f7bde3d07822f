use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::engine::sql_err;
use crate::fulltext::FulltextEditor;
use crate::session::{OverlayEpoch, Session};
use crate::storage::{PartitionKey, Row};
use crate::table::{Table, TableData};

mod constraints;

pub(crate) use constraints::{
    check_index_unique, check_unique, coerce_value_for_column, primary_key_index,
};
use constraints::{prepare_insert, prepare_update, unique_conflicts};

#[derive(Clone, Debug)]
enum Change {
    Insert { key: PartitionKey, row: Row },
    Delete { row: Row },
    Update { old: Row, new: Row },
}

/// Buffers row edits against one table. Each call is validated eagerly
/// against a private working copy; uniqueness is checked over the whole
/// post-edit table when the editor is closed, and only then do the edits
/// become visible. Dropping an editor without closing it discards them.
pub struct TableEditor {
    table: String,
    target: Arc<RwLock<TableData>>,
    // None for tables that bypass session overlays
    epoch: Option<OverlayEpoch>,
    // revision of the target the working copy was taken from
    opened_at: u64,
    // set when the edits replace the current state wholesale
    rewrite: bool,
    staged: TableData,
    log: Vec<Change>,
    forced_auto_inc: Option<u64>,
    fulltext: Option<Box<FulltextEditor>>,
}

impl std::fmt::Debug for TableEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableEditor")
            .field("table", &self.table)
            .field("pending", &self.log.len())
            .field("rewrite", &self.rewrite)
            .finish()
    }
}

impl TableEditor {
    pub(crate) fn for_table(table: &Table, session: &Session) -> anyhow::Result<Self> {
        let epoch = table.session_epoch(session);
        let target = table.session_data(session);
        let staged = target.read().clone();
        let fulltext = FulltextEditor::for_table(table, session, &staged)?.map(Box::new);
        Ok(Self {
            table: table.name().to_string(),
            target,
            epoch,
            opened_at: staged.revision,
            rewrite: false,
            staged,
            log: Vec::new(),
            forced_auto_inc: None,
            fulltext,
        })
    }

    /// An editor whose edits replace `target` wholesale with `fresh` plus
    /// whatever is inserted before close.
    pub(crate) fn for_rewrite(
        table: &Table,
        epoch: Option<OverlayEpoch>,
        target: Arc<RwLock<TableData>>,
        fresh: TableData,
        fulltext: Option<FulltextEditor>,
    ) -> Self {
        Self {
            table: table.name().to_string(),
            target,
            epoch,
            opened_at: fresh.revision,
            rewrite: true,
            staged: fresh,
            log: Vec::new(),
            forced_auto_inc: None,
            fulltext: fulltext.map(Box::new),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn pending(&self) -> usize {
        self.log.len()
    }

    pub fn insert(&mut self, row: Row) -> anyhow::Result<()> {
        let row = prepare_insert(&mut self.staged, row)?;
        self.push_staged(row)
    }

    pub fn update(&mut self, old: Row, new: Row) -> anyhow::Result<()> {
        let new = prepare_update(&mut self.staged, new)?;
        let (key, pos) = self.locate_staged(&old)?;
        self.staged.partitions.rows_mut(&key)?[pos] = new.clone();
        if let Some(ft) = self.fulltext.as_mut() {
            ft.delete(&old)?;
            ft.insert(&new)?;
        }
        self.log.push(Change::Update { old, new });
        Ok(())
    }

    pub fn delete(&mut self, row: Row) -> anyhow::Result<()> {
        self.remove_staged(&row)
    }

    /// Inserts `row`, first deleting any row that shares its primary key or
    /// one of its unique keys.
    pub fn replace(&mut self, row: Row) -> anyhow::Result<()> {
        let row = prepare_insert(&mut self.staged, row)?;
        for old in unique_conflicts(&self.staged, &row) {
            self.remove_staged(&old)?;
        }
        self.push_staged(row)
    }

    /// Forces the next auto-increment value, even below the current one.
    pub fn set_auto_increment_value(&mut self, value: u64) -> anyhow::Result<()> {
        if !self.staged.has_auto_increment() {
            return Err(sql_err(
                "42P16",
                format!("table {} has no auto-increment column", self.table),
            ));
        }
        self.staged.auto_inc_val = value;
        self.forced_auto_inc = Some(value);
        Ok(())
    }

    /// First row of the working copy matching `pred`, edits included.
    pub fn find_staged(&self, pred: impl Fn(&Row) -> bool) -> Option<Row> {
        self.staged.rows().find(|r| pred(r)).cloned()
    }

    /// Validates and publishes every buffered edit, together with the
    /// paired full-text shadow tables. On error nothing is published.
    pub fn close(mut self) -> anyhow::Result<()> {
        let fulltext = self.fulltext.take();
        let table = self.table.clone();
        let changes = self.log.len();
        let rewrite = self.rewrite;
        let target = self.target.clone();

        let mut guard = target.write();
        let next = self.apply_to(&guard)?;
        let shadows = match fulltext {
            Some(ft) => ft.prepare()?,
            None => Vec::new(),
        };
        guard.install(next);
        drop(guard);
        for (shadow, data) in shadows {
            shadow.write().install(data);
        }
        trace!(table = %table, changes, rewrite, "edit batch committed");
        Ok(())
    }

    /// Abandons the buffered edits.
    pub fn discard(self) {
        if !self.log.is_empty() {
            trace!(table = %self.table, changes = self.log.len(), "edit batch discarded");
        }
    }

    /// Validates the buffered edits against the current state without
    /// publishing them. Returns where the result belongs and the result.
    pub(crate) fn prepare(self) -> anyhow::Result<(Arc<RwLock<TableData>>, TableData)> {
        let target = self.target.clone();
        let next = {
            let current = target.read();
            self.apply_to(&current)?
        };
        Ok((target, next))
    }

    // the working copy when `current` is still what it was taken from,
    // otherwise the log replayed onto `current`
    fn apply_to(self, current: &TableData) -> anyhow::Result<TableData> {
        if let Some(epoch) = &self.epoch
            && !epoch.is_current()
        {
            warn!(table = %self.table, "session ended while an edit was open");
            return Err(sql_err(
                "25000",
                format!("edit of table {} outlived its session's transaction", self.table),
            ));
        }
        if self.rewrite || current.revision == self.opened_at {
            check_unique(&self.staged)?;
            return Ok(self.staged);
        }
        if current.schema.len() != self.staged.schema.len() {
            warn!(table = %self.table, "table altered while an edit was open");
            return Err(sql_err(
                "XX000",
                format!("table {} was altered during the edit", self.table),
            ));
        }
        let mut data = current.clone();
        for change in &self.log {
            match change {
                Change::Insert { key, row } => data.partitions.push(key, row.clone())?,
                Change::Delete { row } => {
                    let (key, pos) = locate(&data, &self.table, row)?;
                    data.partitions.remove_at(&key, pos)?;
                }
                Change::Update { old, new } => {
                    let (key, pos) = locate(&data, &self.table, old)?;
                    data.partitions.rows_mut(&key)?[pos] = new.clone();
                }
            }
        }
        data.auto_inc_val = data.auto_inc_val.max(self.staged.auto_inc_val);
        if let Some(forced) = self.forced_auto_inc {
            data.auto_inc_val = forced;
        }
        check_unique(&data)?;
        Ok(data)
    }

    fn push_staged(&mut self, row: Row) -> anyhow::Result<()> {
        let key = self.staged.partitions.insert_key();
        self.staged.partitions.push(&key, row.clone())?;
        if let Some(ft) = self.fulltext.as_mut() {
            ft.insert(&row)?;
        }
        self.log.push(Change::Insert { key, row });
        Ok(())
    }

    fn remove_staged(&mut self, row: &Row) -> anyhow::Result<()> {
        let (key, pos) = self.locate_staged(row)?;
        let removed = self.staged.partitions.remove_at(&key, pos)?;
        if let Some(ft) = self.fulltext.as_mut() {
            ft.delete(&removed)?;
        }
        self.log.push(Change::Delete { row: removed });
        Ok(())
    }

    fn locate_staged(&self, row: &Row) -> anyhow::Result<(PartitionKey, usize)> {
        locate(&self.staged, &self.table, row)
    }
}

fn locate(data: &TableData, table: &str, row: &Row) -> anyhow::Result<(PartitionKey, usize)> {
    data.partitions
        .locate(row)
        .ok_or_else(|| sql_err("42704", format!("row not found in table {table}")))
}
