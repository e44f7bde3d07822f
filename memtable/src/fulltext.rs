use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::catalog::{Column, Schema};
use crate::database::DatabaseHandle;
use crate::editor::TableEditor;
use crate::engine::{DataType, Value, sql_err};
use crate::index::Index;
use crate::session::Session;
use crate::storage::Row;
use crate::table::{Table, TableData};

const MAX_WORD_LEN: usize = 84;
const STOPWORD_KEY: &str = "stopword";

/// Names of the tables backing a full-text index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FulltextTableNames {
    pub config: String,
    pub position: String,
    pub doc_count: String,
    pub global_count: String,
    pub row_count: String,
}

/// How shadow rows point back at their parent row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyColumns {
    PrimaryKey(Vec<usize>),
    // no primary key: rows are identified by a hash of their contents
    RowHash,
}

impl KeyColumns {
    pub fn for_schema(schema: &Schema) -> Self {
        if schema.pk_ordinals.is_empty() {
            KeyColumns::RowHash
        } else {
            KeyColumns::PrimaryKey(schema.pk_ordinals.clone())
        }
    }

    fn values(&self, row: &Row) -> Vec<Value> {
        match self {
            KeyColumns::PrimaryKey(ords) => ords.iter().map(|&o| row[o].clone()).collect(),
            KeyColumns::RowHash => vec![Value::Text(row_hash(row))],
        }
    }

    /// Columns the position and doc-count tables carry for the key.
    pub fn columns(&self, parent: &Schema) -> Vec<Column> {
        match self {
            KeyColumns::PrimaryKey(ords) => ords
                .iter()
                .filter_map(|&o| parent.columns.get(o))
                .map(|c| Column::new(c.name.clone(), c.data_type.clone()).primary_key())
                .collect(),
            KeyColumns::RowHash => {
                vec![Column::new("row_hash", DataType::Varchar(64)).primary_key()]
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FulltextInfo {
    pub position_table: String,
    pub doc_count_table: String,
    pub global_count_table: String,
    pub row_count_table: String,
    pub key_columns: KeyColumns,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowKind {
    Position,
    DocCount,
    GlobalCount,
    RowCount,
}

pub fn shadow_schema(kind: ShadowKind, key_columns: &[Column]) -> Schema {
    let word = Column::new("word", DataType::Varchar(MAX_WORD_LEN as u32)).primary_key();
    let columns = match kind {
        ShadowKind::Position => std::iter::once(word)
            .chain(key_columns.iter().cloned())
            .chain(std::iter::once(
                Column::new("position", DataType::Int8).primary_key(),
            ))
            .collect(),
        ShadowKind::DocCount => std::iter::once(word)
            .chain(key_columns.iter().cloned())
            .chain(std::iter::once(Column::new("count", DataType::Int8).not_null()))
            .collect(),
        ShadowKind::GlobalCount => vec![
            word,
            Column::new("global_count", DataType::Int8).not_null(),
        ],
        ShadowKind::RowCount => vec![
            Column::new("row_hash", DataType::Varchar(64)).primary_key(),
            Column::new("row_count", DataType::Int8).not_null(),
            Column::new("unique_words", DataType::Int8).not_null(),
        ],
    };
    Schema::new(columns)
}

pub fn row_hash(row: &Row) -> String {
    let mut hasher = Sha256::new();
    for v in row {
        hasher.update(v.to_string().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    format!("{digest:x}")
}

pub fn tokenize(text: &str, stopwords: &HashSet<String>) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase().chars().take(MAX_WORD_LEN).collect::<String>())
        .filter(|w| !stopwords.contains(w))
        .collect()
}

fn resolve_shadow(
    db: &DatabaseHandle,
    index: &str,
    role: &str,
    name: &str,
) -> anyhow::Result<Table> {
    db.table_insensitive(name)?.ok_or_else(|| {
        sql_err(
            "F0000",
            format!(
                "index `{index}` declares the table `{name}` as a FULLTEXT {role} table, but it could not be found"
            ),
        )
    })
}

pub(crate) fn fulltext_info<'a>(table: &str, idx: &'a Index) -> anyhow::Result<&'a FulltextInfo> {
    idx.fulltext_info.as_ref().ok_or_else(|| {
        sql_err(
            "F0000",
            format!("index `{}` on `{table}` is FULLTEXT but has no shadow tables", idx.name),
        )
    })
}

/// Shadow tables of one full-text index, as resolved in the owning database.
pub(crate) struct ShadowTables {
    pub position: Table,
    pub doc_count: Table,
    pub global_count: Table,
    pub row_count: Table,
}

pub(crate) fn shadow_tables(table: &Table, idx: &Index) -> anyhow::Result<ShadowTables> {
    let info = fulltext_info(table.name(), idx)?;
    let db = table.database();
    Ok(ShadowTables {
        position: resolve_shadow(db, &idx.name, "position", &info.position_table)?,
        doc_count: resolve_shadow(db, &idx.name, "doc count", &info.doc_count_table)?,
        global_count: resolve_shadow(db, &idx.name, "global count", &info.global_count_table)?,
        row_count: resolve_shadow(db, &idx.name, "row count", &info.row_count_table)?,
    })
}

struct ShadowSet {
    ordinals: Vec<usize>,
    key: KeyColumns,
    position: TableEditor,
    doc_count: TableEditor,
    global_count: TableEditor,
    row_count: TableEditor,
}

impl ShadowSet {
    fn words(&self, row: &Row, stopwords: &HashSet<String>) -> Vec<String> {
        self.ordinals
            .iter()
            .filter_map(|&o| match row.get(o) {
                Some(Value::Null) | None => None,
                Some(v) => Some(v.to_string()),
            })
            .flat_map(|text| tokenize(&text, stopwords))
            .collect()
    }

    fn insert(&mut self, row: &Row, stopwords: &HashSet<String>) -> anyhow::Result<()> {
        let words = self.words(row, stopwords);
        let counts = word_counts(&words);
        let hash = row_hash(row);
        // an identical row already owns the position and doc-count entries
        if self.copies(&hash) == 0 {
            let key = self.key.values(row);
            for (pos, word) in words.iter().enumerate() {
                let mut shadow = vec![Value::Text(word.clone())];
                shadow.extend(key.iter().cloned());
                shadow.push(Value::Int64(pos as i64));
                self.position.insert(shadow)?;
            }
            for (word, count) in &counts {
                let mut shadow = vec![Value::Text(word.clone())];
                shadow.extend(key.iter().cloned());
                shadow.push(Value::Int64(*count));
                self.doc_count.insert(shadow)?;
            }
        }
        for word in counts.keys() {
            bump(&mut self.global_count, word, 1, None)?;
        }
        bump(&mut self.row_count, &hash, 1, Some(counts.len() as i64))
    }

    fn delete(&mut self, row: &Row, stopwords: &HashSet<String>) -> anyhow::Result<()> {
        let words = self.words(row, stopwords);
        let counts = word_counts(&words);
        let hash = row_hash(row);
        if self.copies(&hash) <= 1 {
            let key = self.key.values(row);
            for (pos, word) in words.iter().enumerate() {
                let mut shadow = vec![Value::Text(word.clone())];
                shadow.extend(key.iter().cloned());
                shadow.push(Value::Int64(pos as i64));
                self.position.delete(shadow)?;
            }
            for (word, count) in &counts {
                let mut shadow = vec![Value::Text(word.clone())];
                shadow.extend(key.iter().cloned());
                shadow.push(Value::Int64(*count));
                self.doc_count.delete(shadow)?;
            }
        }
        for word in counts.keys() {
            bump(&mut self.global_count, word, -1, None)?;
        }
        bump(&mut self.row_count, &hash, -1, Some(counts.len() as i64))
    }

    fn copies(&self, hash: &str) -> i64 {
        self.row_count
            .find_staged(|r| matches!(&r[0], Value::Text(h) if h == hash))
            .and_then(|r| r[1].as_i64())
            .unwrap_or(0)
    }

    fn into_editors(self) -> [TableEditor; 4] {
        [self.position, self.doc_count, self.global_count, self.row_count]
    }
}

fn word_counts(words: &[String]) -> BTreeMap<String, i64> {
    let mut counts = BTreeMap::new();
    for w in words {
        *counts.entry(w.clone()).or_insert(0) += 1;
    }
    counts
}

// adjusts the counter row keyed by `key`, removing it once it reaches zero
fn bump(editor: &mut TableEditor, key: &str, delta: i64, extra: Option<i64>) -> anyhow::Result<()> {
    let existing = editor.find_staged(|r| matches!(&r[0], Value::Text(k) if k == key));
    let next = existing
        .as_ref()
        .and_then(|r| r[1].as_i64())
        .unwrap_or(0)
        + delta;
    let mut row = vec![Value::Text(key.to_string()), Value::Int64(next)];
    if let Some(extra) = extra {
        row.push(Value::Int64(extra));
    }
    match existing {
        Some(old) if next <= 0 => editor.delete(old),
        Some(old) => editor.update(old, row),
        None if next > 0 => editor.insert(row),
        None => Ok(()),
    }
}

/// Keeps the shadow tables of every full-text index in step with edits to
/// the parent table.
pub(crate) struct FulltextEditor {
    sets: Vec<ShadowSet>,
    stopwords: HashSet<String>,
}

impl FulltextEditor {
    /// Editors for every full-text index in `data`, or `None` when the table
    /// has none.
    pub(crate) fn for_table(
        table: &Table,
        session: &Session,
        data: &TableData,
    ) -> anyhow::Result<Option<Self>> {
        let indexes: Vec<Index> = data.indexes.fulltext().cloned().collect();
        if indexes.is_empty() {
            return Ok(None);
        }
        Self::for_indexes(table, session, data, indexes).map(Some)
    }

    /// Wires editors for the given full-text indexes of `data`. Missing
    /// shadow or config tables are fatal.
    pub(crate) fn for_indexes(
        table: &Table,
        session: &Session,
        data: &TableData,
        indexes: Vec<Index>,
    ) -> anyhow::Result<Self> {
        let config_name = data.fulltext_config_table.as_deref().ok_or_else(|| {
            sql_err(
                "F0000",
                format!("table `{}` has FULLTEXT indexes but no config table", table.name()),
            )
        })?;
        let config = table.database().table_insensitive(config_name)?.ok_or_else(|| {
            sql_err(
                "F0000",
                format!(
                    "table `{}` declares the table `{config_name}` as a FULLTEXT config table, but it could not be found",
                    table.name()
                ),
            )
        })?;
        let stopwords = read_stopwords(&config.session_data(session));

        let mut sets = Vec::with_capacity(indexes.len());
        for idx in &indexes {
            let info = fulltext_info(table.name(), idx)?;
            let shadows = shadow_tables(table, idx)?;
            sets.push(ShadowSet {
                ordinals: idx.ordinals(),
                key: info.key_columns.clone(),
                position: TableEditor::for_table(&shadows.position, session)?,
                doc_count: TableEditor::for_table(&shadows.doc_count, session)?,
                global_count: TableEditor::for_table(&shadows.global_count, session)?,
                row_count: TableEditor::for_table(&shadows.row_count, session)?,
            });
        }
        Ok(Self { sets, stopwords })
    }

    pub(crate) fn insert(&mut self, row: &Row) -> anyhow::Result<()> {
        for set in &mut self.sets {
            set.insert(row, &self.stopwords)?;
        }
        Ok(())
    }

    pub(crate) fn delete(&mut self, row: &Row) -> anyhow::Result<()> {
        for set in &mut self.sets {
            set.delete(row, &self.stopwords)?;
        }
        Ok(())
    }

    /// Validated post-edit state of every shadow table, paired with where it
    /// gets published.
    pub(crate) fn prepare(self) -> anyhow::Result<Vec<(Arc<RwLock<TableData>>, TableData)>> {
        let mut out = Vec::new();
        for set in self.sets {
            for editor in set.into_editors() {
                out.push(editor.prepare()?);
            }
        }
        Ok(out)
    }
}

// config rows are (key, value); every "stopword" entry contributes its value
fn read_stopwords(config: &Arc<RwLock<TableData>>) -> HashSet<String> {
    config
        .read()
        .rows()
        .filter_map(|r| match (r.first(), r.get(1)) {
            (Some(Value::Text(k)), Some(Value::Text(v))) if k.eq_ignore_ascii_case(STOPWORD_KEY) => {
                Some(v.to_lowercase())
            }
            _ => None,
        })
        .collect()
}
