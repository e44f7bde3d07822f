use std::cmp::Ordering;

use crate::storage::Row;

use super::eval::{Predicate, order_values};
use super::types::{Value, sql_err};

pub trait RowIter: Send {
    fn next(&mut self) -> anyhow::Result<Option<Row>>;
    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) fn project_row(columns: Option<&[usize]>, row: &Row) -> Row {
    match columns {
        Some(cols) if !cols.is_empty() => cols.iter().map(|&c| row[c].clone()).collect(),
        _ => row.clone(),
    }
}

fn passes(filters: &[Predicate], row: &Row) -> anyhow::Result<bool> {
    for f in filters {
        if !f.eval(row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Materialized key used to order rows fetched through an index.
#[derive(Clone, Debug)]
pub struct SortSpec {
    pub ordinals: Vec<usize>,
    pub reverse: bool,
}

impl SortSpec {
    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for &ord in &self.ordinals {
            let (Some(l), Some(r)) = (a.get(ord), b.get(ord)) else {
                continue;
            };
            match order_values(l, r, !self.reverse) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

/// Iterates a point-in-time copy of one partition, applying filters to the
/// full row before projecting it.
pub struct TableIter {
    rows: Vec<Row>,
    pos: usize,
    columns: Option<Vec<usize>>,
    filters: Vec<Predicate>,
}

impl TableIter {
    pub fn new(rows: Vec<Row>, columns: Option<Vec<usize>>, filters: Vec<Predicate>) -> Self {
        Self {
            rows,
            pos: 0,
            columns,
            filters,
        }
    }

    // stable: rows with equal keys keep their partition order
    pub fn sort_by(&mut self, spec: &SortSpec) {
        self.rows.sort_by(|a, b| spec.compare(a, b));
    }
}

impl RowIter for TableIter {
    fn next(&mut self) -> anyhow::Result<Option<Row>> {
        while self.pos < self.rows.len() {
            let row = &self.rows[self.pos];
            self.pos += 1;
            if !passes(&self.filters, row)? {
                continue;
            }
            return Ok(Some(project_row(self.columns.as_deref(), row)));
        }
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min: (f64, f64), max: (f64, f64)) -> Self {
        Self {
            min_x: min.0,
            min_y: min.1,
            max_x: max.0,
            max_y: max.1,
        }
    }

    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Yields only rows whose geometry at `ord` overlaps the query rectangle.
pub struct SpatialTableIter {
    rows: Vec<Row>,
    pos: usize,
    ord: usize,
    columns: Option<Vec<usize>>,
    bbox: BoundingBox,
    filters: Vec<Predicate>,
}

impl SpatialTableIter {
    pub fn new(rows: Vec<Row>, ord: usize, columns: Option<Vec<usize>>, bbox: BoundingBox) -> Self {
        Self {
            rows,
            pos: 0,
            ord,
            columns,
            bbox,
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<Predicate>) -> Self {
        self.filters = filters;
        self
    }

    pub fn sort_by(&mut self, spec: &SortSpec) {
        self.rows.sort_by(|a, b| spec.compare(a, b));
    }
}

impl RowIter for SpatialTableIter {
    fn next(&mut self) -> anyhow::Result<Option<Row>> {
        while self.pos < self.rows.len() {
            let row = &self.rows[self.pos];
            self.pos += 1;
            let g = match row.get(self.ord) {
                Some(Value::Geometry(g)) => g,
                Some(Value::Null) => continue,
                _ => return Err(sql_err("XX000", "spatial index over non-geometry column")),
            };
            let (min_x, min_y, max_x, max_y) = g.bbox();
            let row_box = BoundingBox::new((min_x, min_y), (max_x, max_y));
            if !row_box.overlaps(&self.bbox) {
                continue;
            }
            if !passes(&self.filters, row)? {
                continue;
            }
            return Ok(Some(project_row(self.columns.as_deref(), row)));
        }
        Ok(None)
    }
}

/// Drains an iterator into a vector, closing it afterwards.
pub fn collect_rows(mut iter: Box<dyn RowIter>) -> anyhow::Result<Vec<Row>> {
    let mut out = Vec::new();
    while let Some(row) = iter.next()? {
        out.push(row);
    }
    iter.close()?;
    Ok(out)
}
