use std::fmt;

use crate::engine::{DataType, DefaultExpr, Predicate, sql_err};

pub type TableId = u64;

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub default: Option<DefaultExpr>,
    pub source: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            default: None,
            source: String::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, expr: DefaultExpr) -> Self {
        self.default = Some(expr);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered columns plus the ordinals forming the primary key, in key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
    pub pk_ordinals: Vec<usize>,
}

impl Schema {
    /// Builds a schema whose key is every column flagged `primary_key`, in
    /// column order.
    pub fn new(columns: Vec<Column>) -> Self {
        let pk_ordinals = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        Self {
            columns,
            pk_ordinals,
        }
    }

    pub fn with_pk_ordinals(columns: Vec<Column>, pk_ordinals: Vec<usize>) -> Self {
        Self {
            columns,
            pk_ordinals,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name_eq(name))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name_eq(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn auto_increment_ordinal(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.auto_increment)
    }

    pub fn has_auto_increment(&self) -> bool {
        self.auto_increment_ordinal().is_some()
    }

    pub fn pk_is_auto_increment(&self) -> bool {
        self.pk_ordinals
            .iter()
            .any(|&o| self.columns.get(o).is_some_and(|c| c.auto_increment))
    }

    pub fn column_indexes(&self, names: &[String]) -> anyhow::Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                self.index_of(n)
                    .ok_or_else(|| sql_err("42703", format!("could not find column {n}")))
            })
            .collect()
    }
}

/// Placement of a column added or moved by ALTER TABLE; `None` appends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnOrder {
    First,
    After(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Collation {
    #[default]
    Utf8mb4Bin,
    Utf8mb4GeneralCi,
    Binary,
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Collation::Utf8mb4Bin => "utf8mb4_0900_bin",
            Collation::Utf8mb4GeneralCi => "utf8mb4_general_ci",
            Collation::Binary => "binary",
        })
    }
}

/// A column named by an index definition; `length` is a prefix length, 0 for none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: String,
    pub length: u16,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            length: 0,
        }
    }

    pub fn prefix(name: impl Into<String>, length: u16) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexConstraint {
    #[default]
    None,
    Unique,
    Spatial,
    Fulltext,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub constraint: IndexConstraint,
    pub comment: String,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: Vec<IndexColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            ..Default::default()
        }
    }

    pub fn unique(mut self) -> Self {
        self.constraint = IndexConstraint::Unique;
        self
    }

    pub fn with_constraint(mut self, constraint: IndexConstraint) -> Self {
        self.constraint = constraint;
        self
    }
}

#[derive(Clone, Debug)]
pub struct CheckDefinition {
    pub name: String,
    pub expr: Predicate,
    pub enforced: bool,
}

impl CheckDefinition {
    pub fn new(name: impl Into<String>, expr: Predicate) -> Self {
        Self {
            name: name.into(),
            expr,
            enforced: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
    pub is_resolved: bool,
}

impl ForeignKeyConstraint {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
        parent_table: impl Into<String>,
        parent_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns,
            parent_table: parent_table.into(),
            parent_columns,
            is_resolved: false,
        }
    }

    pub fn is_self_referential(&self) -> bool {
        self.table.eq_ignore_ascii_case(&self.parent_table)
    }

    // column on either side of the relationship
    pub fn involves_column(&self, table: &str, column: &str) -> bool {
        let child = self.table.eq_ignore_ascii_case(table)
            && self.columns.iter().any(|c| c.eq_ignore_ascii_case(column));
        let parent = self.parent_table.eq_ignore_ascii_case(table)
            && self
                .parent_columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(column));
        child || parent
    }
}
