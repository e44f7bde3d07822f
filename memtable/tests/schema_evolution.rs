mod common;

use memtable::engine::DefaultExpr;
use memtable::*;

fn zero() -> DefaultExpr {
    DefaultExpr::literal(0i64)
}

#[test]
fn add_column_after_then_drop_column() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a", "b"]);

    t.add_column(
        s,
        Column::new("c", DataType::Int8).with_default(zero()),
        Some(&ColumnOrder::After("name".into())),
    )
    .unwrap();
    assert_eq!(t.schema(s).names(), ["id", "name", "c"]);
    assert_eq!(
        t.rows(s),
        vec![
            vec![Value::Int64(1), Value::from("a"), Value::Int64(0)],
            vec![Value::Int64(2), Value::from("b"), Value::Int64(0)],
        ]
    );

    t.drop_column(s, "name").unwrap();
    assert_eq!(t.schema(s).names(), ["id", "c"]);
    assert_eq!(
        t.rows(s),
        vec![
            vec![Value::Int64(1), Value::Int64(0)],
            vec![Value::Int64(2), Value::Int64(0)],
        ]
    );

    t.insert(s, vec![Value::Null, Value::Null]).unwrap();
    assert_eq!(t.rows(s)[2], vec![Value::Int64(3), Value::Int64(0)]);
}

#[test]
fn add_column_first_shifts_primary_key() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a"]);
    t.add_column(s, Column::new("tag", DataType::Text), Some(&ColumnOrder::First))
        .unwrap();
    let schema = t.schema(s);
    assert_eq!(schema.names(), ["tag", "id", "name"]);
    assert_eq!(schema.pk_ordinals, vec![1]);
    assert_eq!(schema.auto_increment_ordinal(), Some(1));

    t.insert(s, vec![Value::from("x"), Value::Null, Value::from("b")])
        .unwrap();
    assert_eq!(t.rows(s)[1][1], Value::Int64(2));
}

#[test]
fn add_not_null_column_without_default_fills_zero_values() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a"]);
    t.add_column(s, Column::new("flag", DataType::Bool).not_null(), None)
        .unwrap();
    t.add_column(s, Column::new("note", DataType::Text), None).unwrap();
    assert_eq!(
        t.rows(s)[0],
        vec![Value::Int64(1), Value::from("a"), Value::Bool(false), Value::Null]
    );
}

#[test]
fn add_column_rejections() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    let before = t.schema(s);

    let err = t
        .add_column(s, Column::new("NAME", DataType::Text), None)
        .expect_err("duplicate");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    let err = t
        .add_column(s, Column::new("seq", DataType::Int8).auto_increment(), None)
        .expect_err("second auto column");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    let err = t
        .add_column(
            s,
            Column::new("x", DataType::Int8),
            Some(&ColumnOrder::After("nope".into())),
        )
        .expect_err("unknown anchor");
    common::assert_kind(&err, ErrorKind::NotFound);

    assert_eq!(t.schema(s), before);
}

#[test]
fn added_auto_increment_column_numbers_existing_rows() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = ctx
        .db
        .create_table("plain", Schema::new(vec![Column::new("name", DataType::Text)]))
        .unwrap();
    t.insert(s, vec![Value::from("x")]).unwrap();
    t.insert(s, vec![Value::from("y")]).unwrap();

    t.add_column(s, Column::new("seq", DataType::Int8).auto_increment(), None)
        .unwrap();
    assert_eq!(
        t.rows(s),
        vec![
            vec![Value::from("x"), Value::Int64(1)],
            vec![Value::from("y"), Value::Int64(2)],
        ]
    );
    assert_eq!(t.peek_next_auto_increment_value(s), 3);
}

#[test]
fn drop_column_rules() {
    let ctx = common::start();
    let s = &ctx.session;
    let single = ctx
        .db
        .create_table("single", Schema::new(vec![Column::new("a", DataType::Int8)]))
        .unwrap();
    let err = single.drop_column(s, "a").expect_err("only column");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    let t = ctx
        .db
        .create_table(
            "derived",
            Schema::new(vec![
                Column::new("a", DataType::Int8),
                Column::new("b", DataType::Int8).with_default(DefaultExpr::column(0, "a")),
                Column::new("c", DataType::Int8),
            ]),
        )
        .unwrap();
    let err = t.drop_column(s, "a").expect_err("default depends on a");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);

    let err = t.drop_column(s, "zzz").expect_err("unknown");
    common::assert_kind(&err, ErrorKind::NotFound);

    t.drop_column(s, "c").unwrap();
    assert_eq!(t.schema(s).names(), ["a", "b"]);
}

#[test]
fn dropping_auto_increment_column_clears_sequence() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a", "b"]);
    t.drop_column(s, "id").unwrap();
    let schema = t.schema(s);
    assert!(schema.pk_ordinals.is_empty());
    assert!(!schema.has_auto_increment());
    assert_eq!(t.peek_next_auto_increment_value(s), 0);
    assert_eq!(common::texts(&t.rows(s), 0), ["a", "b"]);
}

#[test]
fn dropping_a_column_drops_its_indexes() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    t.add_column(s, Column::new("age", DataType::Int8), None).unwrap();
    t.create_index(s, IndexDef::new("ix_name", vec![IndexColumn::new("name")]))
        .unwrap();
    t.create_index(s, IndexDef::new("ix_age", vec![IndexColumn::new("age")]))
        .unwrap();

    t.drop_column(s, "name").unwrap();
    let indexes = t.indexes(s);
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, "ix_age");
    assert_eq!(indexes[0].ordinals(), [1]);
}

#[test]
fn modify_column_converts_and_renames() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = ctx
        .db
        .create_table(
            "m",
            Schema::new(vec![
                Column::new("id", DataType::Int8).primary_key(),
                Column::new("qty", DataType::Text),
            ]),
        )
        .unwrap();
    t.insert(s, vec![Value::Int64(1), Value::from("7")]).unwrap();
    t.create_index(s, IndexDef::new("ix_qty", vec![IndexColumn::new("qty")]))
        .unwrap();

    t.modify_column(s, "qty", Column::new("amount", DataType::Int8), Some(&ColumnOrder::First))
        .unwrap();
    let schema = t.schema(s);
    assert_eq!(schema.names(), ["amount", "id"]);
    assert_eq!(schema.pk_ordinals, vec![1]);
    assert_eq!(t.rows(s)[0], vec![Value::Int64(7), Value::Int64(1)]);

    let ix = &t.indexes(s)[0];
    assert_eq!(ix.column_names(), ["amount"]);
    assert_eq!(ix.ordinals(), [0]);
}

#[test]
fn failed_modify_leaves_table_unchanged() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a"]);
    let before = t.schema(s);

    let err = t
        .modify_column(s, "name", Column::new("name", DataType::Int8), None)
        .expect_err("text does not convert");
    common::assert_kind(&err, ErrorKind::InvalidOperation);
    assert_eq!(t.schema(s), before);
    assert_eq!(t.rows(s)[0], common::person(Some(1), "a"));
}

#[test]
fn modify_dropping_auto_increment_keeps_key() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a"]);
    t.modify_column(s, "id", Column::new("id", DataType::Int8), None)
        .unwrap();
    let schema = t.schema(s);
    assert_eq!(schema.pk_ordinals, vec![0]);
    assert!(!schema.has_auto_increment());
    assert_eq!(t.peek_next_auto_increment_value(s), 0);

    let err = t.insert(s, common::person(None, "b")).expect_err("null key");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);
}

#[test]
fn primary_key_create_and_drop() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    let err = t.drop_primary_key(s).expect_err("auto column needs key");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);

    let k = ctx
        .db
        .create_table(
            "k",
            Schema::new(vec![
                Column::new("a", DataType::Int8),
                Column::new("b", DataType::Text),
            ]),
        )
        .unwrap();
    let err = k.drop_primary_key(s).expect_err("no key");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    k.insert(s, vec![Value::Int64(1), Value::from("x")]).unwrap();
    k.insert(s, vec![Value::Int64(1), Value::from("y")]).unwrap();

    let err = k
        .create_primary_key(s, &[IndexColumn::new("a")])
        .expect_err("duplicate keys");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);
    assert!(k.primary_key_schema(s).pk_ordinals.is_empty());

    let err = k
        .create_primary_key(s, &[IndexColumn::prefix("b", 1)])
        .expect_err("prefix");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    k.create_primary_key(s, &[IndexColumn::new("b")]).unwrap();
    let schema = k.primary_key_schema(s);
    assert_eq!(schema.pk_ordinals, vec![1]);
    assert!(schema.columns[1].primary_key);

    let err = k
        .create_primary_key(s, &[IndexColumn::new("a")])
        .expect_err("second key");
    common::assert_kind(&err, ErrorKind::AlreadyExists);

    k.drop_primary_key(s).unwrap();
    assert!(k.schema(s).pk_ordinals.is_empty());
    assert!(k.schema(s).columns.iter().all(|c| !c.primary_key));
}

#[test]
fn primary_key_rejects_null_values() {
    let ctx = common::start();
    let s = &ctx.session;
    let k = ctx
        .db
        .create_table(
            "k",
            Schema::new(vec![
                Column::new("a", DataType::Int8),
                Column::new("b", DataType::Int8),
            ]),
        )
        .unwrap();
    k.insert(s, vec![Value::Null, Value::Int64(1)]).unwrap();
    let err = k
        .create_primary_key(s, &[IndexColumn::new("a")])
        .expect_err("null key");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);
}

#[test]
fn index_ddl() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    common::insert_names(&t, s, &["a", "a"]);

    let err = t
        .create_index(s, IndexDef::new("ux", vec![IndexColumn::new("name")]).unique())
        .expect_err("duplicates present");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);
    assert!(t.indexes(s).is_empty());

    t.create_index(s, IndexDef::new("", vec![IndexColumn::new("name")]))
        .unwrap();
    assert_eq!(t.indexes(s)[0].name, "name_");

    let err = t
        .create_index(s, IndexDef::new("name_", vec![IndexColumn::new("id")]))
        .expect_err("name taken");
    common::assert_kind(&err, ErrorKind::AlreadyExists);
    let err = t
        .create_index(s, IndexDef::new("NAME_", vec![IndexColumn::new("id")]))
        .expect_err("name taken in another case");
    common::assert_kind(&err, ErrorKind::AlreadyExists);
    assert_eq!(t.indexes(s).len(), 1);

    t.rename_index(s, "NAME_", "ix_name").unwrap();
    assert_eq!(t.indexes(s)[0].name, "ix_name");
    let err = t.rename_index(s, "gone", "other").expect_err("missing");
    common::assert_kind(&err, ErrorKind::NotFound);

    let err = t
        .create_index(s, IndexDef::new("ix_id", vec![IndexColumn::prefix("id", 2)]))
        .expect_err("prefix on integer");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    let err = t
        .create_index(
            s,
            IndexDef::new("sp", vec![IndexColumn::new("name")])
                .with_constraint(IndexConstraint::Spatial),
        )
        .expect_err("spatial on text");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    let err = t
        .create_index(
            s,
            IndexDef::new("ft", vec![IndexColumn::new("name")])
                .with_constraint(IndexConstraint::Fulltext),
        )
        .expect_err("full-text goes through its own call");
    common::assert_kind(&err, ErrorKind::InvalidOperation);

    let err = t
        .create_index(s, IndexDef::new("ix", vec![IndexColumn::new("nope")]))
        .expect_err("unknown column");
    common::assert_kind(&err, ErrorKind::NotFound);

    t.drop_index(s, "ix_name").unwrap();
    let err = t.drop_index(s, "ix_name").expect_err("gone");
    common::assert_kind(&err, ErrorKind::NotFound);
}

#[test]
fn prefix_unique_index_compares_prefixes() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    t.create_index(
        s,
        IndexDef::new("ux_pre", vec![IndexColumn::prefix("name", 2)]).unique(),
    )
    .unwrap();
    t.insert(s, common::person(None, "abc")).unwrap();
    let err = t.insert(s, common::person(None, "abd")).expect_err("same prefix");
    common::assert_kind(&err, ErrorKind::ConstraintViolation);
    t.insert(s, common::person(None, "xbc")).unwrap();
}

#[test]
fn collation_changes() {
    let ctx = common::start();
    let s = &ctx.session;
    let t = common::people(&ctx);
    assert_eq!(t.collation(s), Collation::Utf8mb4Bin);
    t.modify_default_collation(s, Collation::Utf8mb4GeneralCi).unwrap();
    assert_eq!(t.collation(s), Collation::Utf8mb4GeneralCi);
    let err = t
        .modify_stored_collation(s, Collation::Binary)
        .expect_err("unsupported");
    common::assert_kind(&err, ErrorKind::InvalidOperation);
}
