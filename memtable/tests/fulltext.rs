mod common;

use memtable::fulltext::{FulltextTableNames, KeyColumns, ShadowKind, shadow_schema};
use memtable::*;

fn names() -> FulltextTableNames {
    FulltextTableNames {
        config: "ft_config".into(),
        position: "docs_pos".into(),
        doc_count: "docs_dc".into(),
        global_count: "docs_gc".into(),
        row_count: "docs_rc".into(),
    }
}

fn docs_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", DataType::Int8).primary_key(),
        Column::new("body", DataType::Text),
    ])
}

/// Creates the parent, config and shadow tables; "the" is a stopword.
fn setup(ctx: &common::TestCtx, schema: Schema) -> Table {
    let s = &ctx.session;
    let docs = ctx.db.create_table("docs", schema.clone()).unwrap();
    let config = ctx
        .db
        .create_table(
            "ft_config",
            Schema::new(vec![
                Column::new("k", DataType::Text),
                Column::new("v", DataType::Text),
            ]),
        )
        .unwrap();
    config
        .insert(s, vec![Value::from("stopword"), Value::from("the")])
        .unwrap();

    let key_columns = KeyColumns::for_schema(&schema).columns(&schema);
    let n = names();
    for (name, kind) in [
        (&n.position, ShadowKind::Position),
        (&n.doc_count, ShadowKind::DocCount),
        (&n.global_count, ShadowKind::GlobalCount),
        (&n.row_count, ShadowKind::RowCount),
    ] {
        ctx.db
            .create_table(name, shadow_schema(kind, &key_columns))
            .unwrap();
    }
    docs
}

fn shadow(ctx: &common::TestCtx, name: &str) -> Vec<Row> {
    ctx.db.table(name).unwrap().rows(&ctx.session)
}

fn global_count(ctx: &common::TestCtx, word: &str) -> Option<i64> {
    shadow(ctx, "docs_gc")
        .into_iter()
        .find(|r| r[0] == Value::from(word))
        .and_then(|r| r[1].as_i64())
}

fn create_body_index(docs: &Table, s: &Session, schema: &Schema) {
    docs.create_fulltext_index(
        s,
        IndexDef::new("ft_body", vec![IndexColumn::new("body")]),
        KeyColumns::for_schema(schema),
        names(),
    )
    .unwrap();
}

#[test]
fn inserts_and_deletes_maintain_shadow_tables() {
    let ctx = common::start();
    let s = &ctx.session;
    let docs = setup(&ctx, docs_schema());
    create_body_index(&docs, s, &docs_schema());

    let first = vec![Value::Int64(1), Value::from("The quick fox")];
    let second = vec![Value::Int64(2), Value::from("quick quick dog")];
    let mut ed = docs.inserter(s).unwrap();
    ed.insert(first.clone()).unwrap();
    ed.insert(second.clone()).unwrap();
    ed.close().unwrap();

    assert_eq!(shadow(&ctx, "docs_pos").len(), 5);
    assert!(shadow(&ctx, "docs_pos").contains(&vec![
        Value::from("quick"),
        Value::Int64(2),
        Value::Int64(1),
    ]));
    assert!(shadow(&ctx, "docs_dc").contains(&vec![
        Value::from("quick"),
        Value::Int64(2),
        Value::Int64(2),
    ]));
    assert_eq!(shadow(&ctx, "docs_dc").len(), 4);
    assert_eq!(global_count(&ctx, "quick"), Some(2));
    assert_eq!(global_count(&ctx, "fox"), Some(1));
    assert_eq!(global_count(&ctx, "the"), None);
    let row_counts = shadow(&ctx, "docs_rc");
    assert_eq!(row_counts.len(), 2);
    assert!(row_counts.iter().all(|r| r[1] == Value::Int64(1) && r[2] == Value::Int64(2)));

    let mut ed = docs.deleter(s).unwrap();
    ed.delete(second).unwrap();
    ed.close().unwrap();

    assert_eq!(shadow(&ctx, "docs_pos").len(), 2);
    assert_eq!(shadow(&ctx, "docs_dc").len(), 2);
    assert_eq!(global_count(&ctx, "quick"), Some(1));
    assert_eq!(global_count(&ctx, "dog"), None);
    assert_eq!(shadow(&ctx, "docs_rc").len(), 1);
}

#[test]
fn updates_move_words() {
    let ctx = common::start();
    let s = &ctx.session;
    let docs = setup(&ctx, docs_schema());
    create_body_index(&docs, s, &docs_schema());
    let before = vec![Value::Int64(1), Value::from("red apple")];
    docs.insert(s, before.clone()).unwrap();

    let mut ed = docs.updater(s).unwrap();
    ed.update(before, vec![Value::Int64(1), Value::from("green apple")])
        .unwrap();
    ed.close().unwrap();

    assert_eq!(global_count(&ctx, "red"), None);
    assert_eq!(global_count(&ctx, "green"), Some(1));
    assert_eq!(global_count(&ctx, "apple"), Some(1));
    assert_eq!(shadow(&ctx, "docs_rc").len(), 1);
}

#[test]
fn index_creation_backfills_existing_rows() {
    let ctx = common::start();
    let s = &ctx.session;
    let docs = setup(&ctx, docs_schema());
    docs.insert(s, vec![Value::Int64(1), Value::from("alpha beta")])
        .unwrap();
    docs.insert(s, vec![Value::Int64(2), Value::Null]).unwrap();

    create_body_index(&docs, s, &docs_schema());
    assert_eq!(global_count(&ctx, "alpha"), Some(1));
    assert_eq!(shadow(&ctx, "docs_pos").len(), 2);
    assert!(docs.indexes(s)[0].fulltext);
}

#[test]
fn duplicate_rows_without_key_share_position_entries() {
    let ctx = common::start();
    let s = &ctx.session;
    let schema = Schema::new(vec![Column::new("body", DataType::Text)]);
    let docs = setup(&ctx, schema.clone());
    create_body_index(&docs, s, &schema);

    let row = vec![Value::from("same words")];
    docs.insert(s, row.clone()).unwrap();
    docs.insert(s, row.clone()).unwrap();
    assert_eq!(shadow(&ctx, "docs_pos").len(), 2);
    assert_eq!(global_count(&ctx, "same"), Some(2));
    let rc = shadow(&ctx, "docs_rc");
    assert_eq!(rc.len(), 1);
    assert_eq!(rc[0][0], Value::from(fulltext::row_hash(&row)));
    assert_eq!(rc[0][1], Value::Int64(2));

    let mut ed = docs.deleter(s).unwrap();
    ed.delete(row.clone()).unwrap();
    ed.close().unwrap();
    assert_eq!(shadow(&ctx, "docs_pos").len(), 2);
    assert_eq!(shadow(&ctx, "docs_rc")[0][1], Value::Int64(1));

    let mut ed = docs.deleter(s).unwrap();
    ed.delete(row).unwrap();
    ed.close().unwrap();
    assert!(shadow(&ctx, "docs_pos").is_empty());
    assert!(shadow(&ctx, "docs_rc").is_empty());
}

#[test]
fn failed_parent_edit_leaves_shadows_alone() {
    let ctx = common::start();
    let s = &ctx.session;
    let docs = setup(&ctx, docs_schema());
    create_body_index(&docs, s, &docs_schema());
    docs.insert(s, vec![Value::Int64(1), Value::from("one")]).unwrap();

    let err = docs
        .insert(s, vec![Value::Int64(1), Value::from("two")])
        .expect_err("duplicate key");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);
    assert_eq!(global_count(&ctx, "two"), None);
    assert_eq!(shadow(&ctx, "docs_rc").len(), 1);
}

#[test]
fn missing_shadow_table_is_fatal() {
    let ctx = common::start();
    let s = &ctx.session;
    let docs = setup(&ctx, docs_schema());
    create_body_index(&docs, s, &docs_schema());
    ctx.db.drop_table("docs_gc").unwrap();

    let err = docs
        .insert(s, vec![Value::Int64(1), Value::from("x")])
        .expect_err("shadow table gone");
    common::assert_kind(&err, ErrorKind::Fatal);
    common::assert_error_contains(&err, "docs_gc");
}

#[test]
fn fulltext_index_rules() {
    let ctx = common::start();
    let s = &ctx.session;
    let docs = setup(&ctx, docs_schema());

    let err = docs
        .create_fulltext_index(
            s,
            IndexDef::new("ft_id", vec![IndexColumn::new("id")]),
            KeyColumns::for_schema(&docs_schema()),
            names(),
        )
        .expect_err("integer column");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    create_body_index(&docs, s, &docs_schema());
    let renamed = FulltextTableNames {
        config: "other_config".into(),
        ..names()
    };
    let err = docs
        .create_fulltext_index(
            s,
            IndexDef::new("ft_again", vec![IndexColumn::new("body")]),
            KeyColumns::for_schema(&docs_schema()),
            renamed,
        )
        .expect_err("config table is fixed per table");
    common::assert_kind(&err, ErrorKind::InvalidOperation);
}

#[test]
fn rewrite_resets_and_refills_shadows() {
    let ctx = common::start();
    let s = &ctx.session;
    let docs = setup(&ctx, docs_schema());
    create_body_index(&docs, s, &docs_schema());
    docs.insert(s, vec![Value::Int64(1), Value::from("kept words")])
        .unwrap();

    let old = docs.schema(s);
    let new = Schema::new(vec![
        Column::new("id", DataType::Int8).primary_key(),
        Column::new("body", DataType::Text),
        Column::new("extra", DataType::Int8),
    ]);
    let rows = docs.rows(s);
    let mut ed = docs
        .rewrite_inserter(s, &old, &new, None, None, &[])
        .unwrap();
    assert!(shadow(&ctx, "docs_pos").is_empty());
    for mut row in rows {
        row.push(Value::Null);
        ed.insert(row).unwrap();
    }
    ed.close().unwrap();

    assert_eq!(docs.schema(s).len(), 3);
    assert_eq!(global_count(&ctx, "kept"), Some(1));
    assert_eq!(shadow(&ctx, "docs_pos").len(), 2);
}
