#![allow(dead_code)]

use std::sync::{Arc, Once};

use memtable::engine::collect_rows;
use memtable::*;

pub struct TestCtx {
    pub db: Arc<Database>,
    pub sessions: SessionManager,
    pub session: Arc<Session>,
}

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn start() -> TestCtx {
    start_with(StorageConfig::default())
}

pub fn start_with(config: StorageConfig) -> TestCtx {
    init_tracing();
    let db = Database::new("db", config);
    let sessions = SessionManager::new();
    let session = sessions.create_session();
    TestCtx {
        db,
        sessions,
        session,
    }
}

/// `t(id int8 primary key auto_increment, name text)`
pub fn people_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", DataType::Int8).primary_key().auto_increment(),
        Column::new("name", DataType::Text),
    ])
}

pub fn people(ctx: &TestCtx) -> Table {
    ctx.db.create_table("t", people_schema()).expect("create t")
}

pub fn person(id: Option<i64>, name: &str) -> Row {
    vec![id.map_or(Value::Null, Value::Int64), Value::from(name)]
}

pub fn insert_names(table: &Table, session: &Session, names: &[&str]) {
    let mut ed = table.inserter(session).expect("inserter");
    for name in names {
        ed.insert(person(None, name)).expect("insert");
    }
    ed.close().expect("close");
}

pub fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r[0].as_i64().expect("int id")).collect()
}

pub fn texts(rows: &[Row], ord: usize) -> Vec<String> {
    rows.iter().map(|r| r[ord].to_string()).collect()
}

/// Every row a scan yields, partition by partition.
pub fn scan(table: &Table, session: &Session) -> Vec<Row> {
    let mut out = Vec::new();
    for p in table.partitions(session).expect("partitions") {
        let it = table.partition_rows(session, &p).expect("partition rows");
        out.extend(collect_rows(it).expect("collect"));
    }
    out
}

pub fn assert_kind(err: &anyhow::Error, kind: ErrorKind) {
    assert_eq!(error_kind(err), Some(kind), "unexpected error: {err:#}");
}

pub fn assert_error_contains(err: &anyhow::Error, needle: &str) {
    let msg = format!("{err:#}");
    assert!(msg.contains(needle), "expected '{needle}' in '{msg}'");
}
