use tracing::debug;

use super::{Table, TableData};
use crate::capabilities::RewritableTable;
use crate::catalog::{Column, IndexColumn, Schema};
use crate::editor::TableEditor;
use crate::engine::sql_err;
use crate::fulltext::{FulltextEditor, KeyColumns, ShadowKind, shadow_schema, shadow_tables};
use crate::session::Session;

fn is_primary_key_change(old: &Schema, new: &Schema) -> bool {
    old.pk_ordinals.len() != new.pk_ordinals.len()
}

fn is_primary_key_drop(old: &Schema, new: &Schema) -> bool {
    !old.pk_ordinals.is_empty() && new.pk_ordinals.is_empty()
}

fn is_column_drop(old: &Schema, new: &Schema) -> bool {
    old.len() > new.len()
}

fn order_changed(
    old: &Schema,
    new: &Schema,
    old_column: Option<&Column>,
    new_column: Option<&Column>,
) -> bool {
    let (Some(old_column), Some(new_column)) = (old_column, new_column) else {
        return false;
    };
    old.index_of(&old_column.name) != new.index_of(&new_column.name)
}

fn validate_primary_key_change(new: &Schema, index_columns: &[IndexColumn]) -> anyhow::Result<()> {
    for ic in index_columns {
        let col = new
            .column(&ic.name)
            .ok_or_else(|| sql_err("42703", format!("column {} does not exist", ic.name)))?;
        if col.primary_key && ic.length > 0 && col.data_type.is_text() {
            return Err(sql_err(
                "0A000",
                format!("prefix length on primary key column {} is not supported", col.name),
            ));
        }
    }
    Ok(())
}

// primary key columns are always stored non-null
fn normalize_schema(new: &Schema) -> Schema {
    let mut schema = new.clone();
    for col in &mut schema.columns {
        if col.primary_key {
            col.nullable = false;
        }
    }
    schema
}

impl TableData {
    /// Empty copy of this table under `schema`. Indexes follow their columns;
    /// full-text indexes lose dropped columns and vanish once none are left.
    fn rewritten(&self, schema: Schema) -> TableData {
        let mut data = self.clone();
        data.truncate(schema);
        let key_columns = KeyColumns::for_schema(&data.schema);
        let schema = data.schema.clone();
        for idx in data.indexes.iter_mut().filter(|i| i.fulltext) {
            idx.exprs.retain(|e| schema.index_of(&e.name).is_some());
            if let Some(info) = idx.fulltext_info.as_mut() {
                info.key_columns = key_columns.clone();
            }
        }
        data.indexes
            .retain(|i| !i.exprs.is_empty() && i.exprs.iter().all(|e| schema.index_of(&e.name).is_some()));
        for idx in data.indexes.iter_mut() {
            idx.rebind(&schema);
        }
        data
    }
}

impl Table {
    // empties every shadow table of `data` under schemas keyed for the new layout
    fn reset_fulltext_shadows(&self, session: &Session, data: &TableData) -> anyhow::Result<()> {
        let key_columns = KeyColumns::for_schema(&data.schema).columns(&data.schema);
        for idx in data.indexes.fulltext() {
            let shadows = shadow_tables(self, idx)?;
            for (table, kind) in [
                (&shadows.position, ShadowKind::Position),
                (&shadows.doc_count, ShadowKind::DocCount),
                (&shadows.global_count, ShadowKind::GlobalCount),
                (&shadows.row_count, ShadowKind::RowCount),
            ] {
                let mut fresh = table.session_data(session).read().clone();
                fresh.truncate(shadow_schema(kind, &key_columns));
                table.publish(session, fresh);
            }
        }
        Ok(())
    }
}

impl RewritableTable for Table {
    fn should_rewrite(
        &self,
        old_schema: &Schema,
        new_schema: &Schema,
        old_column: Option<&Column>,
        new_column: Option<&Column>,
    ) -> bool {
        order_changed(old_schema, new_schema, old_column, new_column)
            || is_column_drop(old_schema, new_schema)
            || is_primary_key_change(old_schema, new_schema)
    }

    /// An editor over an empty copy of the table under `new_schema`. The
    /// caller streams every row back in; closing the editor replaces the
    /// session's data with the result.
    fn rewrite_inserter(
        &self,
        session: &Session,
        old_schema: &Schema,
        new_schema: &Schema,
        _old_column: Option<&Column>,
        _new_column: Option<&Column>,
        index_columns: &[IndexColumn],
    ) -> anyhow::Result<TableEditor> {
        if is_primary_key_drop(old_schema, new_schema) && old_schema.pk_is_auto_increment() {
            return Err(sql_err(
                "2BP01",
                "incorrect table definition; there can be only one auto column and it must be defined as a key",
            ));
        }
        if is_primary_key_change(old_schema, new_schema) {
            validate_primary_key_change(new_schema, index_columns)?;
        }

        let epoch = self.session_epoch(session);
        let target = self.session_data(session);
        let fresh = target.read().rewritten(normalize_schema(new_schema));
        self.reset_fulltext_shadows(session, &fresh)?;
        let fulltext = FulltextEditor::for_table(self, session, &fresh)?;
        debug!(
            table = %self.name(),
            columns = fresh.schema.len(),
            primary_key = fresh.schema.pk_ordinals.len(),
            "rewrite started"
        );
        Ok(TableEditor::for_rewrite(self, epoch, target, fresh, fulltext))
    }
}
