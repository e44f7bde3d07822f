use tracing::debug;

use super::{Table, TableData};
use crate::capabilities::*;
use crate::catalog::{
    CheckDefinition, Collation, Column, ColumnOrder, ForeignKeyConstraint, IndexColumn,
    IndexConstraint, IndexDef, Schema,
};
use crate::editor::{TableEditor, check_index_unique, coerce_value_for_column, primary_key_index};
use crate::engine::{DataType, Value, sql_err};
use crate::foreign_keys::{ForeignKeyCollection, not_found};
use crate::fulltext::{FulltextEditor, FulltextInfo, FulltextTableNames, KeyColumns};
use crate::index::{Index, IndexExpr, has_null};
use crate::session::Session;

fn unknown_column(name: &str) -> anyhow::Error {
    sql_err("42703", format!("column {name} does not exist"))
}

fn duplicate_column(name: &str) -> anyhow::Error {
    sql_err("42701", format!("column {name} already exists"))
}

// position of `order` within `columns`; `None` appends
fn resolve_order(columns: &[Column], order: Option<&ColumnOrder>) -> anyhow::Result<usize> {
    match order {
        None => Ok(columns.len()),
        Some(ColumnOrder::First) => Ok(0),
        Some(ColumnOrder::After(name)) => columns
            .iter()
            .position(|c| c.name_eq(name))
            .map(|i| i + 1)
            .ok_or_else(|| unknown_column(name)),
    }
}

fn is_prefixable(data_type: &DataType) -> bool {
    data_type.is_text() || matches!(data_type, DataType::Bytea)
}

/// Builds an index over the current schema of `data`. An empty name is
/// synthesized from the column names.
pub(super) fn build_index(data: &TableData, def: &IndexDef) -> anyhow::Result<Index> {
    if def.columns.is_empty() {
        return Err(sql_err("0A000", "index must reference at least one column"));
    }
    let name = if def.name.is_empty() {
        def.columns.iter().map(|c| format!("{}_", c.name)).collect()
    } else {
        def.name.clone()
    };
    let mut exprs = Vec::with_capacity(def.columns.len());
    for ic in &def.columns {
        let ord = data
            .schema
            .index_of(&ic.name)
            .ok_or_else(|| sql_err("42703", format!("unknown column in index {name}: {}", ic.name)))?;
        let col = &data.schema.columns[ord];
        if ic.length > 0 && !is_prefixable(&col.data_type) {
            return Err(sql_err(
                "0A000",
                format!("prefix length on non-string column {} in index {name}", col.name),
            ));
        }
        exprs.push(IndexExpr {
            index: ord,
            table: data.table_name.clone(),
            name: col.name.clone(),
            data_type: col.data_type.clone(),
            nullable: col.nullable,
        });
    }
    let spatial = def.constraint == IndexConstraint::Spatial;
    if spatial
        && (exprs.len() != 1 || !matches!(exprs[0].data_type, DataType::Geometry { .. }))
    {
        return Err(sql_err(
            "0A000",
            format!("spatial index {name} must cover exactly one geometry column"),
        ));
    }
    let prefix_lengths = if def.columns.iter().any(|c| c.length > 0) {
        def.columns.iter().map(|c| c.length).collect()
    } else {
        Vec::new()
    };
    Ok(Index {
        name,
        table: data.table_name.clone(),
        exprs,
        unique: def.constraint == IndexConstraint::Unique,
        spatial,
        fulltext: def.constraint == IndexConstraint::Fulltext,
        prefix_lengths,
        comment: def.comment.clone(),
        fulltext_info: None,
    })
}

impl TableData {
    fn rebind_defaults(&mut self) {
        let schema = self.schema.clone();
        let resolve = |n: &str| schema.index_of(n);
        for col in &mut self.schema.columns {
            if let Some(default) = &col.default {
                col.default = Some(default.rebind(&resolve));
            }
        }
    }

    // indexes whose columns are gone are dropped
    fn rebind_indexes(&mut self) {
        let schema = self.schema.clone();
        self.indexes.retain(|idx| {
            idx.exprs
                .iter()
                .all(|e| schema.index_of(&e.name).is_some())
        });
        for idx in self.indexes.iter_mut() {
            idx.rebind(&schema);
        }
    }

    fn sync_auto_increment_ordinal(&mut self) {
        self.auto_col_idx = self.schema.auto_increment_ordinal();
    }

    pub(crate) fn add_column(
        &mut self,
        mut column: Column,
        order: Option<&ColumnOrder>,
    ) -> anyhow::Result<usize> {
        if self.schema.index_of(&column.name).is_some() {
            return Err(duplicate_column(&column.name));
        }
        if column.auto_increment && self.has_auto_increment() {
            return Err(sql_err(
                "42P16",
                format!("table {} already has an auto-increment column", self.table_name),
            ));
        }
        column.source = self.table_name.clone();
        if column.primary_key {
            column.nullable = false;
        }
        let pos = resolve_order(&self.schema.columns, order)?;

        let mut columns = self.schema.columns.clone();
        columns.insert(pos, column.clone());
        let mut pk_ordinals: Vec<usize> = self
            .schema
            .pk_ordinals
            .iter()
            .map(|&o| if o >= pos { o + 1 } else { o })
            .collect();
        if column.primary_key {
            pk_ordinals.push(pos);
        }
        self.schema = Schema::with_pk_ordinals(columns, pk_ordinals);
        self.rebind_defaults();

        let column = self.schema.columns[pos].clone();
        self.partitions.try_map_rows(|row| {
            let mut next = row.clone();
            next.insert(pos, Value::Null);
            let value = match &column.default {
                Some(default) if !column.auto_increment => default.eval(&next)?,
                _ => Value::Null,
            };
            next[pos] = match value {
                Value::Null if column.auto_increment => Value::Null,
                Value::Null if !column.nullable => column.data_type.zero(),
                v => coerce_value_for_column(v, &column, pos)?,
            };
            Ok(next)
        })?;

        self.rebind_indexes();
        if column.auto_increment {
            self.seed_auto_increment(pos)?;
        } else {
            self.sync_auto_increment_ordinal();
        }
        Ok(pos)
    }

    pub(crate) fn drop_column(&mut self, name: &str) -> anyhow::Result<usize> {
        let pos = self.schema.index_of(name).ok_or_else(|| unknown_column(name))?;
        if self.schema.len() == 1 {
            return Err(sql_err("0A000", "cannot drop the only column"));
        }
        if let Some(fk) = self.fk_coll.involving_column(&self.table_name, name) {
            return Err(sql_err(
                "2BP01",
                format!("cannot drop column {name} used by foreign key {}", fk.name),
            ));
        }
        if let Some(dependent) = self.schema.columns.iter().find(|c| {
            c.default.as_ref().is_some_and(|d| {
                d.referenced_columns()
                    .iter()
                    .any(|(_, n)| n.eq_ignore_ascii_case(name))
            })
        }) {
            return Err(sql_err(
                "2BP01",
                format!("cannot drop column {name} referenced by the default of {}", dependent.name),
            ));
        }
        let dropped = self.schema.columns[pos].clone();

        let mut columns = self.schema.columns.clone();
        columns.remove(pos);
        let pk_ordinals = self
            .schema
            .pk_ordinals
            .iter()
            .filter(|&&o| o != pos)
            .map(|&o| if o > pos { o - 1 } else { o })
            .collect();
        self.schema = Schema::with_pk_ordinals(columns, pk_ordinals);
        self.rebind_defaults();
        self.partitions.try_map_rows(|row| {
            let mut next = row.clone();
            next.remove(pos);
            Ok(next)
        })?;
        self.rebind_indexes();
        if dropped.auto_increment {
            self.clear_auto_increment();
        } else {
            self.sync_auto_increment_ordinal();
        }
        Ok(pos)
    }

    /// Replaces column `name` with `column`, converting every stored value.
    /// Key membership follows the old column; losing auto-increment clears the
    /// sequence.
    pub(crate) fn modify_column(
        &mut self,
        name: &str,
        mut column: Column,
        order: Option<&ColumnOrder>,
    ) -> anyhow::Result<usize> {
        let old_pos = self.schema.index_of(name).ok_or_else(|| unknown_column(name))?;
        let old = self.schema.columns[old_pos].clone();
        if !column.name_eq(&old.name) && self.schema.index_of(&column.name).is_some() {
            return Err(duplicate_column(&column.name));
        }
        if column.auto_increment && self.auto_col_idx.is_some_and(|i| i != old_pos) {
            return Err(sql_err(
                "42P16",
                format!("table {} already has an auto-increment column", self.table_name),
            ));
        }
        column.source = self.table_name.clone();
        column.primary_key = old.primary_key;
        if column.primary_key {
            column.nullable = false;
        }

        let mut remaining = self.schema.columns.clone();
        remaining.remove(old_pos);
        let new_pos = match order {
            None => old_pos,
            Some(order) => resolve_order(&remaining, Some(order))?,
        };

        let pk_names: Vec<String> = self
            .schema
            .pk_ordinals
            .iter()
            .map(|&o| {
                if o == old_pos {
                    column.name.clone()
                } else {
                    self.schema.columns[o].name.clone()
                }
            })
            .collect();
        let mut columns = remaining;
        columns.insert(new_pos, column.clone());
        let schema = Schema::with_pk_ordinals(columns, Vec::new());
        let pk_ordinals = pk_names
            .iter()
            .filter_map(|n| schema.index_of(n))
            .collect();
        self.schema = Schema::with_pk_ordinals(schema.columns, pk_ordinals);

        let renamed = !old.name.eq_ignore_ascii_case(&column.name);
        let resolve = |n: &str| {
            if renamed && n.eq_ignore_ascii_case(&old.name) {
                Some(new_pos)
            } else {
                self.schema.index_of(n)
            }
        };
        let defaults: Vec<_> = self
            .schema
            .columns
            .iter()
            .map(|c| c.default.as_ref().map(|d| d.rebind(&resolve)))
            .collect();
        for (col, default) in self.schema.columns.iter_mut().zip(defaults) {
            col.default = default;
        }

        self.partitions.try_map_rows(|row| {
            let mut next = row.clone();
            let value = next.remove(old_pos);
            let converted = match value {
                Value::Null if column.auto_increment => Value::Null,
                v => coerce_value_for_column(v, &column, new_pos)?,
            };
            next.insert(new_pos, converted);
            Ok(next)
        })?;

        for idx in self.indexes.iter_mut() {
            for e in &mut idx.exprs {
                if e.name.eq_ignore_ascii_case(&old.name) {
                    e.name = column.name.clone();
                }
            }
        }
        self.rebind_indexes();

        match (old.auto_increment, column.auto_increment) {
            (true, false) => self.clear_auto_increment(),
            (false, true) => self.seed_auto_increment(new_pos)?,
            _ => self.sync_auto_increment_ordinal(),
        }
        crate::editor::check_unique(self)?;
        Ok(new_pos)
    }

    pub(crate) fn create_primary_key(&mut self, columns: &[IndexColumn]) -> anyhow::Result<()> {
        if !self.schema.pk_ordinals.is_empty() || self.schema.columns.iter().any(|c| c.primary_key)
        {
            return Err(sql_err("42710", "multiple primary keys defined"));
        }
        let mut ordinals = Vec::with_capacity(columns.len());
        for ic in columns {
            let ord = self
                .schema
                .index_of(&ic.name)
                .ok_or_else(|| sql_err("42703", format!("key column {} doesn't exist in table", ic.name)))?;
            if ic.length > 0 {
                return Err(sql_err(
                    "0A000",
                    format!("prefix length on primary key column {} is not supported", ic.name),
                ));
            }
            ordinals.push(ord);
        }
        if self.rows().any(|r| has_null(r, &ordinals)) {
            return Err(sql_err(
                "23502",
                format!("primary key of table {} cannot contain nulls", self.table_name),
            ));
        }
        let mut schema = self.schema.clone();
        for &ord in &ordinals {
            schema.columns[ord].primary_key = true;
            schema.columns[ord].nullable = false;
        }
        schema.pk_ordinals = ordinals;
        let previous = std::mem::replace(&mut self.schema, schema);
        if let Some(pk) = primary_key_index(self)
            && let Err(err) = check_index_unique(&pk, self.rows())
        {
            self.schema = previous;
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn drop_primary_key(&mut self) -> anyhow::Result<()> {
        if self.schema.pk_ordinals.is_empty() {
            return Err(sql_err(
                "42000",
                format!("can't drop PRIMARY; check that table {} has a primary key", self.table_name),
            ));
        }
        if self.schema.has_auto_increment() {
            return Err(sql_err(
                "2BP01",
                "incorrect table definition; there can be only one auto column and it must be defined as a key",
            ));
        }
        for &ord in &self.schema.pk_ordinals {
            let col = &self.schema.columns[ord].name;
            if let Some(fk) = self.fk_coll.involving_column(&self.table_name, col) {
                return Err(sql_err(
                    "2BP01",
                    format!("cannot drop index PRIMARY: needed in foreign key constraint {}", fk.name),
                ));
            }
        }
        for col in &mut self.schema.columns {
            col.primary_key = false;
        }
        self.schema.pk_ordinals.clear();
        Ok(())
    }

    pub(crate) fn create_check(&mut self, mut check: CheckDefinition) -> anyhow::Result<String> {
        if check.name.is_empty() {
            let mut n = self.checks.len() + 1;
            check.name = loop {
                let candidate = format!("{}_chk_{n}", self.table_name);
                if !self.checks.iter().any(|c| c.name.eq_ignore_ascii_case(&candidate)) {
                    break candidate;
                }
                n += 1;
            };
        }
        if self.checks.iter().any(|c| c.name.eq_ignore_ascii_case(&check.name)) {
            return Err(sql_err("42710", format!("constraint {} already exists", check.name)));
        }
        if check.enforced {
            for row in self.rows() {
                if !check.expr.eval(row)? {
                    return Err(sql_err(
                        "23514",
                        format!("check constraint {} is violated by an existing row", check.name),
                    ));
                }
            }
        }
        let name = check.name.clone();
        self.checks.push(check);
        Ok(name)
    }

    pub(crate) fn drop_check(&mut self, name: &str) -> anyhow::Result<()> {
        let pos = self
            .checks
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| sql_err("42704", format!("check '{name}' was not found on the table")))?;
        self.checks.remove(pos);
        Ok(())
    }
}

impl AlterableTable for Table {
    fn add_column(
        &self,
        session: &Session,
        column: Column,
        order: Option<&ColumnOrder>,
    ) -> anyhow::Result<()> {
        let name = column.name.clone();
        let pos = self.alter_session_data(session, |data| data.add_column(column, order))?;
        debug!(table = %self.name(), column = %name, pos, "column added");
        Ok(())
    }

    fn drop_column(&self, session: &Session, name: &str) -> anyhow::Result<()> {
        let pos = self.alter_session_data(session, |data| data.drop_column(name))?;
        debug!(table = %self.name(), column = %name, pos, "column dropped");
        Ok(())
    }

    fn modify_column(
        &self,
        session: &Session,
        name: &str,
        column: Column,
        order: Option<&ColumnOrder>,
    ) -> anyhow::Result<()> {
        let new_name = column.name.clone();
        let pos = self.alter_session_data(session, |data| data.modify_column(name, column, order))?;
        debug!(table = %self.name(), column = %name, new_name = %new_name, pos, "column modified");
        Ok(())
    }
}

impl IndexAlterableTable for Table {
    fn create_index(&self, session: &Session, def: IndexDef) -> anyhow::Result<()> {
        if def.constraint == IndexConstraint::Fulltext {
            return Err(sql_err(
                "0A000",
                "full-text indexes need their shadow tables; use create_fulltext_index",
            ));
        }
        let name = self.alter_session_data(session, |data| {
            let index = build_index(data, &def)?;
            if index.unique {
                check_index_unique(&index, data.rows())?;
            }
            let name = index.name.clone();
            data.indexes.insert(index)?;
            Ok(name)
        })?;
        debug!(
            table = %self.name(),
            index = %name,
            unique = def.constraint == IndexConstraint::Unique,
            "index created"
        );
        Ok(())
    }

    fn drop_index(&self, session: &Session, name: &str) -> anyhow::Result<()> {
        self.with_session_data(session, |data| data.indexes.drop(name).map(|_| ()))?;
        debug!(table = %self.name(), index = %name, "index dropped");
        Ok(())
    }

    fn rename_index(&self, session: &Session, from: &str, to: &str) -> anyhow::Result<()> {
        self.with_session_data(session, |data| data.indexes.rename(from, to))?;
        debug!(table = %self.name(), from = %from, to = %to, "index renamed");
        Ok(())
    }

    /// Registers a full-text index and fills its shadow tables from the rows
    /// already present.
    fn create_fulltext_index(
        &self,
        session: &Session,
        def: IndexDef,
        key_columns: KeyColumns,
        tables: FulltextTableNames,
    ) -> anyhow::Result<()> {
        let target = self.session_data(session);
        let mut next = target.read().clone();
        match &next.fulltext_config_table {
            Some(existing) if !existing.eq_ignore_ascii_case(&tables.config) => {
                return Err(sql_err(
                    "0A000",
                    format!(
                        "full-text config table name has been changed from `{existing}` to `{}`",
                        tables.config
                    ),
                ));
            }
            Some(_) => {}
            None => next.fulltext_config_table = Some(tables.config.clone()),
        }
        let def = def.with_constraint(IndexConstraint::Fulltext);
        let mut index = build_index(&next, &def)?;
        if let Some(e) = index.exprs.iter().find(|e| !e.data_type.is_text()) {
            return Err(sql_err(
                "0A000",
                format!("full-text index {} over non-text column {}", index.name, e.name),
            ));
        }
        index.fulltext_info = Some(FulltextInfo {
            position_table: tables.position,
            doc_count_table: tables.doc_count,
            global_count_table: tables.global_count,
            row_count_table: tables.row_count,
            key_columns,
        });
        let name = index.name.clone();
        next.indexes.insert(index.clone())?;

        let mut ft = FulltextEditor::for_indexes(self, session, &next, vec![index])?;
        for row in next.rows() {
            ft.insert(row)?;
        }
        let shadows = ft.prepare()?;
        target.write().install(next);
        for (shadow, data) in shadows {
            shadow.write().install(data);
        }
        debug!(table = %self.name(), index = %name, "full-text index created");
        Ok(())
    }
}

impl PrimaryKeyAlterableTable for Table {
    fn primary_key_schema(&self, session: &Session) -> Schema {
        self.session_data(session).read().schema.clone()
    }

    fn create_primary_key(&self, session: &Session, columns: &[IndexColumn]) -> anyhow::Result<()> {
        self.alter_session_data(session, |data| data.create_primary_key(columns))?;
        debug!(table = %self.name(), columns = columns.len(), "primary key created");
        Ok(())
    }

    fn drop_primary_key(&self, session: &Session) -> anyhow::Result<()> {
        self.alter_session_data(session, TableData::drop_primary_key)?;
        debug!(table = %self.name(), "primary key dropped");
        Ok(())
    }
}

impl CheckAlterableTable for Table {
    fn checks(&self, session: &Session) -> Vec<CheckDefinition> {
        self.session_data(session).read().checks.clone()
    }

    fn create_check(&self, session: &Session, check: CheckDefinition) -> anyhow::Result<()> {
        let name = self.alter_session_data(session, |data| data.create_check(check))?;
        debug!(table = %self.name(), check = %name, "check created");
        Ok(())
    }

    fn drop_check(&self, session: &Session, name: &str) -> anyhow::Result<()> {
        self.alter_session_data(session, |data| data.drop_check(name))?;
        debug!(table = %self.name(), check = %name, "check dropped");
        Ok(())
    }
}

impl Table {
    // the parent side keeps a copy so it can answer referenced_foreign_keys
    fn parent_of(&self, fk: &ForeignKeyConstraint) -> anyhow::Result<Option<Table>> {
        if fk.is_self_referential() {
            return Ok(None);
        }
        self.database().table_insensitive(&fk.parent_table)
    }

    // both sides are edited on copies first; neither is written unless both succeed
    fn edit_foreign_keys(
        &self,
        session: &Session,
        fk: &ForeignKeyConstraint,
        child: impl FnOnce(&mut ForeignKeyCollection) -> anyhow::Result<()>,
        parent: impl FnOnce(&mut ForeignKeyCollection) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let parent_table = self.parent_of(fk)?;
        let mut declared = self.session_data(session).read().fk_coll.clone();
        child(&mut declared)?;
        let referenced = match parent_table {
            Some(table) => {
                let mut keys = table.session_data(session).read().fk_coll.clone();
                parent(&mut keys)?;
                Some((table, keys))
            }
            None => None,
        };
        self.with_session_data(session, |data| {
            data.fk_coll = declared;
            Ok(())
        })?;
        if let Some((table, keys)) = referenced {
            table.with_session_data(session, |data| {
                data.fk_coll = keys;
                Ok(())
            })?;
        }
        Ok(())
    }

    fn declared_foreign_key(
        &self,
        session: &Session,
        name: &str,
    ) -> anyhow::Result<ForeignKeyConstraint> {
        self.session_data(session)
            .read()
            .fk_coll
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }
}

impl ForeignKeyTable for Table {
    fn declared_foreign_keys(&self, session: &Session) -> Vec<ForeignKeyConstraint> {
        self.session_data(session).read().fk_coll.declared(self.name())
    }

    fn referenced_foreign_keys(&self, session: &Session) -> Vec<ForeignKeyConstraint> {
        self.session_data(session).read().fk_coll.referenced(self.name())
    }

    fn add_foreign_key(&self, session: &Session, fk: ForeignKeyConstraint) -> anyhow::Result<()> {
        self.edit_foreign_keys(
            session,
            &fk,
            |keys| keys.add(fk.clone()),
            |keys| keys.add(fk.clone()),
        )?;
        debug!(table = %self.name(), fk = %fk.name, parent = %fk.parent_table, "foreign key added");
        Ok(())
    }

    fn drop_foreign_key(&self, session: &Session, name: &str) -> anyhow::Result<()> {
        let fk = self.declared_foreign_key(session, name)?;
        self.edit_foreign_keys(
            session,
            &fk,
            |keys| {
                keys.drop(name);
                Ok(())
            },
            |keys| {
                keys.drop(name);
                Ok(())
            },
        )?;
        debug!(table = %self.name(), fk = %name, "foreign key dropped");
        Ok(())
    }

    fn update_foreign_key(
        &self,
        session: &Session,
        name: &str,
        fk: ForeignKeyConstraint,
    ) -> anyhow::Result<()> {
        self.edit_foreign_keys(
            session,
            &fk,
            |keys| keys.update(name, fk.clone()),
            |keys| {
                if keys.get(name).is_some() {
                    keys.update(name, fk.clone())
                } else {
                    keys.add(fk.clone())
                }
            },
        )?;
        debug!(table = %self.name(), fk = %name, new_name = %fk.name, "foreign key updated");
        Ok(())
    }

    fn set_foreign_key_resolved(&self, session: &Session, name: &str) -> anyhow::Result<()> {
        let fk = self.declared_foreign_key(session, name)?;
        self.edit_foreign_keys(
            session,
            &fk,
            |keys| {
                keys.set_resolved(name);
                Ok(())
            },
            |keys| {
                keys.set_resolved(name);
                Ok(())
            },
        )
    }

    fn create_index_for_foreign_key(&self, session: &Session, def: IndexDef) -> anyhow::Result<()> {
        IndexAlterableTable::create_index(self, session, def)
    }

    fn foreign_key_editor(&self, session: &Session) -> anyhow::Result<TableEditor> {
        TableEditor::for_table(self, session)
    }
}

impl CollationAlterableTable for Table {
    fn modify_stored_collation(
        &self,
        _session: &Session,
        collation: Collation,
    ) -> anyhow::Result<()> {
        Err(sql_err(
            "0A000",
            format!("converting the collations of columns to {collation} is not yet supported"),
        ))
    }

    fn modify_default_collation(
        &self,
        session: &Session,
        collation: Collation,
    ) -> anyhow::Result<()> {
        self.with_session_data(session, |data| {
            data.collation = collation;
            Ok(())
        })?;
        debug!(table = %self.name(), %collation, "default collation changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DefaultExpr, ErrorKind, error_kind};

    fn data() -> TableData {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Int8).primary_key(),
            Column::new("name", DataType::Text),
        ]);
        let mut d = TableData::new("db", "t", schema, 2, Collation::default());
        d.partitions.push("0", vec![Value::Int64(1), Value::from("a")]).unwrap();
        d.partitions.push("1", vec![Value::Int64(2), Value::from("b")]).unwrap();
        d
    }

    #[test]
    fn add_first_shifts_key_and_defaults() {
        let mut d = data();
        let col = Column::new("copy", DataType::Int8).with_default(DefaultExpr::column(0, "id"));
        d.add_column(col, Some(&ColumnOrder::First)).unwrap();
        assert_eq!(d.schema.pk_ordinals, vec![1]);
        let rows: Vec<_> = d.rows().cloned().collect();
        assert_eq!(rows[0], vec![Value::Int64(1), Value::Int64(1), Value::from("a")]);
        assert_eq!(
            d.schema.columns[0].default,
            Some(DefaultExpr::column(1, "id"))
        );
    }

    #[test]
    fn modify_converts_values_and_follows_key() {
        let mut d = data();
        let err = d
            .modify_column("name", Column::new("name", DataType::Int8), None)
            .unwrap_err();
        assert!(error_kind(&err).is_some());
        let mut d = data();
        d.modify_column("id", Column::new("ident", DataType::Int4), Some(&ColumnOrder::After("name".into())))
            .unwrap();
        assert_eq!(d.schema.names(), ["name", "ident"]);
        assert_eq!(d.schema.pk_ordinals, vec![1]);
        assert!(d.schema.columns[1].primary_key);
    }

    #[test]
    fn drop_primary_key_rules() {
        let mut d = data();
        d.drop_primary_key().unwrap();
        let err = d.drop_primary_key().unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::InvalidOperation));
        d.create_primary_key(&[IndexColumn::new("name")]).unwrap();
        let err = d.create_primary_key(&[IndexColumn::new("id")]).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::AlreadyExists));
    }

    #[test]
    fn generated_check_names_count_up() {
        let mut d = data();
        let always = crate::engine::Predicate::from_fn("true", |_| Ok(true));
        let first = d.create_check(CheckDefinition::new("", always.clone())).unwrap();
        let second = d.create_check(CheckDefinition::new("", always)).unwrap();
        assert_eq!(first, "t_chk_1");
        assert_eq!(second, "t_chk_2");
        assert!(d.drop_check("T_CHK_1").is_ok());
        assert!(d.drop_check("t_chk_1").is_err());
    }
}
