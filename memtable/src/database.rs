use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::catalog::{Collation, Schema, TableId};
use crate::config::StorageConfig;
use crate::engine::sql_err;
use crate::table::{Table, TableData};

// process-wide so session overlays never confuse tables of different databases
static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Per-table overrides of the database defaults.
#[derive(Clone, Debug, Default)]
pub struct TableOptions {
    pub partitions: Option<usize>,
    pub collation: Option<Collation>,
    pub ignore_session_data: bool,
}

/// Owns the baseline data of every table it contains.
pub struct Database {
    name: String,
    config: StorageConfig,
    tables: RwLock<BTreeMap<String, Table>>,
    self_ref: Weak<Database>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("tables", &self.table_names())
            .finish()
    }
}

impl Database {
    pub fn new(name: impl Into<String>, config: StorageConfig) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|self_ref| Self {
            name,
            config,
            tables: RwLock::new(BTreeMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn handle(&self) -> DatabaseHandle {
        DatabaseHandle {
            name: self.name.clone(),
            db: self.self_ref.clone(),
        }
    }

    pub fn create_table(&self, name: &str, schema: Schema) -> anyhow::Result<Table> {
        self.create_table_with(name, schema, TableOptions::default())
    }

    pub fn create_partitioned_table(
        &self,
        name: &str,
        schema: Schema,
        partitions: usize,
    ) -> anyhow::Result<Table> {
        let opts = TableOptions {
            partitions: Some(partitions),
            ..Default::default()
        };
        self.create_table_with(name, schema, opts)
    }

    pub fn create_table_with_collation(
        &self,
        name: &str,
        schema: Schema,
        collation: Collation,
    ) -> anyhow::Result<Table> {
        let opts = TableOptions {
            collation: Some(collation),
            ..Default::default()
        };
        self.create_table_with(name, schema, opts)
    }

    /// A table whose edits bypass session overlays and land on the shared
    /// data immediately.
    pub fn create_local_table(&self, name: &str, schema: Schema) -> anyhow::Result<Table> {
        let opts = TableOptions {
            ignore_session_data: true,
            ..Default::default()
        };
        self.create_table_with(name, schema, opts)
    }

    pub fn create_table_with(
        &self,
        name: &str,
        schema: Schema,
        opts: TableOptions,
    ) -> anyhow::Result<Table> {
        let key = name.to_ascii_lowercase();
        let mut tables = self.tables.write();
        if tables.contains_key(&key) {
            return Err(sql_err("42P07", format!("table {}.{} already exists", self.name, name)));
        }
        let partitions = opts.partitions.unwrap_or(self.config.default_partitions);
        let collation = opts.collation.unwrap_or(self.config.default_collation);
        let mut data = TableData::new(&self.name, name, schema, partitions, collation);
        data.primary_key_indexes = self.config.primary_key_indexes;
        let id: TableId = NEXT_TABLE_ID.fetch_add(1, Ordering::SeqCst);
        let table = Table::new(id, name, data, self.handle(), opts.ignore_session_data);
        debug!(db = %self.name, table = name, id, partitions, "created table");
        tables.insert(key, table.clone());
        Ok(table)
    }

    pub fn drop_table(&self, name: &str) -> anyhow::Result<Table> {
        let removed = self.tables.write().remove(&name.to_ascii_lowercase());
        match removed {
            Some(t) => {
                debug!(db = %self.name, table = name, "dropped table");
                Ok(t)
            }
            None => Err(sql_err("42P01", format!("no such table {}.{}", self.name, name))),
        }
    }

    pub fn table(&self, name: &str) -> Option<Table> {
        self.tables.read().get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().values().map(|t| t.name().to_string()).collect()
    }
}

/// Non-owning reference from a table back to its database.
#[derive(Clone, Debug, Default)]
pub struct DatabaseHandle {
    name: String,
    db: Weak<Database>,
}

impl DatabaseHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upgrade(&self) -> Option<Arc<Database>> {
        self.db.upgrade()
    }

    /// Looks up a sibling table; a handle whose database is gone is a wiring
    /// defect, reported as fatal.
    pub fn table_insensitive(&self, name: &str) -> anyhow::Result<Option<Table>> {
        let db = self.upgrade().ok_or_else(|| {
            sql_err("F0000", format!("database {} is gone while resolving table {name}", self.name))
        })?;
        Ok(db.table(name))
    }
}

/// Resolves tables across databases by name.
#[derive(Debug, Default)]
pub struct DatabaseProvider {
    databases: DashMap<String, Arc<Database>>,
}

impl DatabaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_database(&self, db: Arc<Database>) {
        self.databases.insert(db.name().to_ascii_lowercase(), db);
    }

    pub fn database(&self, name: &str) -> anyhow::Result<Arc<Database>> {
        self.databases
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.clone())
            .ok_or_else(|| sql_err("42704", format!("database {name} does not exist")))
    }

    /// Only the current version of a table exists; any other `as_of` tag is
    /// reported as not found.
    pub fn table(&self, db: &str, name: &str, as_of: Option<&str>) -> anyhow::Result<Table> {
        if let Some(tag) = as_of
            && !tag.eq_ignore_ascii_case("current")
        {
            return Err(sql_err("42P01", format!("table {db}.{name} has no version {tag}")));
        }
        self.database(db)?
            .table(name)
            .ok_or_else(|| sql_err("42P01", format!("no such table {db}.{name}")))
    }
}
