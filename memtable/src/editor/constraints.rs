use std::collections::HashSet;

use crate::catalog::Column;
use crate::engine::{Value, cast_value_to_type, sql_err};
use crate::index::{Index, PRIMARY_KEY_INDEX, has_null};
use crate::storage::Row;
use crate::table::TableData;

pub(crate) fn coerce_value_for_column(
    val: Value,
    col: &Column,
    idx: usize,
) -> anyhow::Result<Value> {
    if let Value::Null = val {
        if col.primary_key {
            return Err(sql_err("23502", format!("primary key column {} cannot be null", col.name)));
        }
        if !col.nullable {
            return Err(sql_err("23502", format!("column {} cannot be null", col.name)));
        }
        return Ok(Value::Null);
    }
    cast_value_to_type(val, &col.data_type).map_err(|e| {
        sql_err(e.code, format!("column {} (index {}): {}", col.name, idx, e.message))
    })
}

fn check_arity(data: &TableData, row: &Row) -> anyhow::Result<()> {
    if row.len() != data.schema.len() {
        return Err(sql_err(
            "21S01",
            format!(
                "column count {} doesn't match value count {} for table {}",
                data.schema.len(),
                row.len(),
                data.table_name
            ),
        ));
    }
    Ok(())
}

fn coerce_row(data: &TableData, row: Row) -> anyhow::Result<Row> {
    row.into_iter()
        .zip(&data.schema.columns)
        .enumerate()
        .map(|(i, (v, col))| coerce_value_for_column(v, col, i))
        .collect()
}

fn check_constraints(data: &TableData, row: &Row) -> anyhow::Result<()> {
    for check in data.checks.iter().filter(|c| c.enforced) {
        if !check.expr.eval(row)? {
            return Err(sql_err("23514", format!("check constraint {} is violated", check.name)));
        }
    }
    Ok(())
}

/// Fills defaults and the auto-increment value, converts every value to its
/// column type and runs per-row constraints.
pub(crate) fn prepare_insert(data: &mut TableData, mut row: Row) -> anyhow::Result<Row> {
    check_arity(data, &row)?;
    for i in 0..row.len() {
        let col = &data.schema.columns[i];
        if row[i].is_null()
            && !col.auto_increment
            && let Some(default) = &col.default
        {
            row[i] = default.eval(&row)?;
        }
    }
    data.assign_auto_increment(&mut row)?;
    let row = coerce_row(data, row)?;
    check_constraints(data, &row)?;
    Ok(row)
}

pub(crate) fn prepare_update(data: &mut TableData, row: Row) -> anyhow::Result<Row> {
    check_arity(data, &row)?;
    let row = coerce_row(data, row)?;
    if let Some(idx) = data.auto_col_idx {
        data.observe_auto_increment(&row[idx])?;
    }
    check_constraints(data, &row)?;
    Ok(row)
}

/// The primary key, exposed as a unique index over the key columns.
pub(crate) fn primary_key_index(data: &TableData) -> Option<Index> {
    if data.schema.pk_ordinals.is_empty() {
        return None;
    }
    let exprs = data
        .schema
        .pk_ordinals
        .iter()
        .map(|&ord| {
            let col = &data.schema.columns[ord];
            crate::index::IndexExpr {
                index: ord,
                table: data.table_name.clone(),
                name: col.name.clone(),
                data_type: col.data_type.clone(),
                nullable: col.nullable,
            }
        })
        .collect();
    Some(Index {
        name: PRIMARY_KEY_INDEX.to_string(),
        table: data.table_name.clone(),
        exprs,
        unique: true,
        spatial: false,
        fulltext: false,
        prefix_lengths: Vec::new(),
        comment: String::new(),
        fulltext_info: None,
    })
}

fn unique_indexes(data: &TableData) -> Vec<Index> {
    primary_key_index(data)
        .into_iter()
        .chain(data.indexes.unique().cloned())
        .collect()
}

pub(crate) fn duplicate_entry(index: &Index, key: &[Value]) -> anyhow::Error {
    let rendered: Vec<String> = key.iter().map(|v| v.to_string()).collect();
    sql_err(
        "23505",
        format!(
            "duplicate entry '{}' for key '{}'",
            rendered.join(","),
            index.name
        ),
    )
}

/// Fails if two rows project the same non-null key over `index`.
pub(crate) fn check_index_unique<'a>(
    index: &Index,
    rows: impl Iterator<Item = &'a Row>,
) -> anyhow::Result<()> {
    let ordinals = index.ordinals();
    let mut seen = HashSet::new();
    for row in rows {
        if has_null(row, &ordinals) {
            continue;
        }
        let key = index.key(row);
        if !seen.insert(key.clone()) {
            return Err(duplicate_entry(index, &key));
        }
    }
    Ok(())
}

pub(crate) fn check_unique(data: &TableData) -> anyhow::Result<()> {
    for index in unique_indexes(data) {
        check_index_unique(&index, data.rows())?;
    }
    Ok(())
}

/// Rows that share the primary key or any unique key with `row`.
pub(crate) fn unique_conflicts(data: &TableData, row: &Row) -> Vec<Row> {
    let indexes = unique_indexes(data);
    let mut out: Vec<Row> = Vec::new();
    for existing in data.rows() {
        let clash = indexes.iter().any(|idx| {
            let ordinals = idx.ordinals();
            !has_null(row, &ordinals) && idx.key(row) == idx.key(existing)
        });
        if clash && !out.contains(existing) {
            out.push(existing.clone());
        }
    }
    out
}
