use crate::catalog::ForeignKeyConstraint;
use crate::engine::sql_err;

/// Foreign keys known to one table: those it declares and those that
/// reference it. Names are unique case-insensitively.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForeignKeyCollection {
    keys: Vec<ForeignKeyConstraint>,
}

impl ForeignKeyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[ForeignKeyConstraint] {
        &self.keys
    }

    pub fn get(&self, name: &str) -> Option<&ForeignKeyConstraint> {
        self.keys.iter().find(|fk| fk.name.eq_ignore_ascii_case(name))
    }

    pub fn add(&mut self, fk: ForeignKeyConstraint) -> anyhow::Result<()> {
        if self.get(&fk.name).is_some() {
            return Err(duplicate(&fk.name));
        }
        self.keys.push(fk);
        Ok(())
    }

    pub fn drop(&mut self, name: &str) -> bool {
        let before = self.keys.len();
        self.keys.retain(|fk| !fk.name.eq_ignore_ascii_case(name));
        self.keys.len() != before
    }

    /// Replaces `name` with `fk`. The new name is checked against the other
    /// entries first, so a failed update leaves the collection unchanged.
    pub fn update(&mut self, name: &str, fk: ForeignKeyConstraint) -> anyhow::Result<()> {
        let pos = self
            .keys
            .iter()
            .position(|k| k.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| not_found(name))?;
        let collides = self
            .keys
            .iter()
            .enumerate()
            .any(|(i, k)| i != pos && k.name.eq_ignore_ascii_case(&fk.name));
        if collides {
            return Err(duplicate(&fk.name));
        }
        self.keys[pos] = fk;
        Ok(())
    }

    pub fn set_resolved(&mut self, name: &str) -> bool {
        match self
            .keys
            .iter_mut()
            .find(|fk| fk.name.eq_ignore_ascii_case(name))
        {
            Some(fk) => {
                fk.is_resolved = true;
                true
            }
            None => false,
        }
    }

    /// Constraints where `table` is the child.
    pub fn declared(&self, table: &str) -> Vec<ForeignKeyConstraint> {
        self.keys
            .iter()
            .filter(|fk| fk.table.eq_ignore_ascii_case(table))
            .cloned()
            .collect()
    }

    /// Constraints where `table` is the parent.
    pub fn referenced(&self, table: &str) -> Vec<ForeignKeyConstraint> {
        self.keys
            .iter()
            .filter(|fk| fk.parent_table.eq_ignore_ascii_case(table))
            .cloned()
            .collect()
    }

    pub fn involving_column(&self, table: &str, column: &str) -> Option<&ForeignKeyConstraint> {
        self.keys.iter().find(|fk| fk.involves_column(table, column))
    }
}

pub(crate) fn not_found(name: &str) -> anyhow::Error {
    sql_err("42704", format!("foreign key {name} does not exist"))
}

fn duplicate(name: &str) -> anyhow::Error {
    sql_err("42710", format!("duplicate foreign key constraint name {name}"))
}
