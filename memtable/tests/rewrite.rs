mod common;

use memtable::*;

fn composite_key_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", DataType::Int8).primary_key().auto_increment(),
        Column::new("name", DataType::Text).primary_key(),
    ])
}

#[test]
fn rewrite_on_primary_key_change_reloads_rows() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a", "b"]);
    let old = t.schema(s);
    let new = composite_key_schema();
    assert!(t.should_rewrite(&old, &new, None, None));

    let rows = t.rows(s);
    let mut ed = t
        .rewrite_inserter(
            s,
            &old,
            &new,
            None,
            None,
            &[IndexColumn::new("id"), IndexColumn::new("name")],
        )
        .unwrap();
    // nothing changes until the editor closes
    assert_eq!(t.rows(s).len(), 2);
    assert_eq!(t.schema(s), old);

    for row in rows.clone() {
        ed.insert(row).unwrap();
    }
    ed.close().unwrap();

    let schema = t.schema(s);
    assert_eq!(schema.pk_ordinals, vec![0, 1]);
    assert_eq!(t.rows(s), rows);
    assert_eq!(t.peek_next_auto_increment_value(s), 3);
}

#[test]
fn rewrite_triggers() {
    let ctx = common::start();
    let t = common::people(&ctx);
    let old = common::people_schema();

    let appended = Schema::new(vec![
        Column::new("id", DataType::Int8).primary_key().auto_increment(),
        Column::new("name", DataType::Text),
        Column::new("extra", DataType::Int8),
    ]);
    assert!(!t.should_rewrite(&old, &appended, None, appended.column("extra")));

    let dropped = Schema::new(vec![
        Column::new("id", DataType::Int8).primary_key().auto_increment(),
    ]);
    assert!(t.should_rewrite(&old, &dropped, None, None));

    let moved = Schema::new(vec![
        Column::new("name", DataType::Text),
        Column::new("id", DataType::Int8).primary_key().auto_increment(),
    ]);
    let name = old.column("name");
    assert!(t.should_rewrite(&old, &moved, name, moved.column("name")));
}

#[test]
fn rewrite_dropping_a_column_drops_its_indexes() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    t.create_index(s, IndexDef::new("ix_name", vec![IndexColumn::new("name")]))
        .unwrap();
    common::insert_names(&t, s, &["a", "b"]);
    let old = t.schema(s);
    let new = Schema::new(vec![
        Column::new("id", DataType::Int8).primary_key().auto_increment(),
    ]);

    let mut ed = t.rewrite_inserter(s, &old, &new, None, None, &[]).unwrap();
    for row in t.rows(s) {
        ed.insert(vec![row[0].clone()]).unwrap();
    }
    ed.close().unwrap();

    assert_eq!(t.schema(s).names(), ["id"]);
    assert!(t.indexes(s).is_empty());
    assert_eq!(common::ids(&t.rows(s)), [1, 2]);
}

#[test]
fn rewrite_refuses_to_drop_auto_increment_key() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    let old = t.schema(s);
    let new = Schema::new(vec![
        Column::new("id", DataType::Int8).auto_increment(),
        Column::new("name", DataType::Text),
    ]);
    let err = t
        .rewrite_inserter(s, &old, &new, None, None, &[])
        .expect_err("auto column must stay keyed");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);
}

#[test]
fn rewrite_rejects_prefix_on_text_key() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    let old = t.schema(s);
    let err = t
        .rewrite_inserter(
            s,
            &old,
            &composite_key_schema(),
            None,
            None,
            &[IndexColumn::new("id"), IndexColumn::prefix("name", 3)],
        )
        .expect_err("prefix on text key");
    common::assert_kind(&err, ErrorKind::InvalidOperation);
}

#[test]
fn failed_rewrite_keeps_old_table() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = ctx
        .db
        .create_table(
            "plain",
            Schema::new(vec![
                Column::new("a", DataType::Int8),
                Column::new("b", DataType::Int8),
            ]),
        )
        .unwrap();
    t.insert(s, vec![Value::Int64(1), Value::Int64(1)]).unwrap();
    t.insert(s, vec![Value::Int64(1), Value::Int64(2)]).unwrap();
    let old = t.schema(s);
    let new = Schema::new(vec![
        Column::new("a", DataType::Int8).primary_key(),
        Column::new("b", DataType::Int8),
    ]);

    let mut ed = t
        .rewrite_inserter(s, &old, &new, None, None, &[IndexColumn::new("a")])
        .unwrap();
    for row in t.rows(s) {
        ed.insert(row).unwrap();
    }
    let err = ed.close().expect_err("duplicate key");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);

    assert_eq!(t.schema(s), old);
    assert_eq!(t.rows(s).len(), 2);
}

#[test]
fn discarded_rewrite_keeps_old_table() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a"]);
    let old = t.schema(s);
    let ed = t
        .rewrite_inserter(
            s,
            &old,
            &composite_key_schema(),
            None,
            None,
            &[IndexColumn::new("id"), IndexColumn::new("name")],
        )
        .unwrap();
    ed.discard();
    assert_eq!(t.schema(s), old);
    assert_eq!(t.rows(s), vec![common::person(Some(1), "a")]);
}
