use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::types::{DataType, SqlError, Value, sql_err};

pub fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if matches!(lhs, Value::Null) || matches!(rhs, Value::Null) {
        return None;
    }
    Some(match (lhs, rhs) {
        (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
        (Value::Float64Bits(_), _) | (_, Value::Float64Bits(_)) => {
            let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
            if a.is_nan() && b.is_nan() {
                Ordering::Equal
            } else if a.is_nan() {
                Ordering::Greater
            } else if b.is_nan() {
                Ordering::Less
            } else {
                a.partial_cmp(&b)?
            }
        }
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::TimestampMicros(a), Value::TimestampMicros(b)) => a.cmp(b),
        (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
        _ => return None,
    })
}

// nulls sort lowest, so they lead ascending scans and trail descending ones
pub fn order_values(a: &Value, b: &Value, asc: bool) -> Ordering {
    let ord = match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b))),
    };
    if asc { ord } else { ord.reverse() }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int64(_) | Value::Float64Bits(_) => 2,
        Value::Date(_) => 3,
        Value::TimestampMicros(_) => 4,
        Value::Text(_) => 5,
        Value::Bytes(_) => 6,
        Value::Geometry(_) => 7,
    }
}

pub fn cast_value_to_type(val: Value, target: &DataType) -> Result<Value, SqlError> {
    fn out_of_range(val: &Value, target: &DataType) -> SqlError {
        SqlError::new(
            "22003",
            format!("value {val} out of range for column type {target}"),
        )
    }
    fn mismatch(val: &Value, target: &DataType) -> SqlError {
        SqlError::new(
            "42804",
            format!("cannot convert value {val} to type {target}"),
        )
    }
    fn float_to_int(f: f64, val: &Value, target: &DataType) -> Result<i64, SqlError> {
        let rounded = f.round();
        if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
            return Err(out_of_range(val, target));
        }
        Ok(rounded as i64)
    }

    if val.is_null() {
        return Ok(Value::Null);
    }
    match (target, val) {
        (DataType::Int4 | DataType::Int8, v) => {
            let int = match &v {
                Value::Int64(i) => *i,
                Value::Bool(b) => i64::from(*b),
                Value::Float64Bits(bits) => float_to_int(f64::from_bits(*bits), &v, target)?,
                Value::Text(s) => s.trim().parse::<i64>().map_err(|_| mismatch(&v, target))?,
                _ => return Err(mismatch(&v, target)),
            };
            if *target == DataType::Int4 && (int < i32::MIN as i64 || int > i32::MAX as i64) {
                return Err(out_of_range(&v, target));
            }
            Ok(Value::Int64(int))
        }
        (DataType::Float8, v) => match &v {
            Value::Float64Bits(bits) => Ok(Value::Float64Bits(*bits)),
            Value::Int64(i) => Ok(Value::from_f64(*i as f64)),
            Value::Bool(b) => Ok(Value::from_f64(if *b { 1.0 } else { 0.0 })),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from_f64)
                .map_err(|_| mismatch(&v, target)),
            _ => Err(mismatch(&v, target)),
        },
        (DataType::Text, Value::Text(s)) => Ok(Value::Text(s)),
        (DataType::Varchar(max), Value::Text(s)) => {
            if s.chars().count() > *max as usize {
                return Err(SqlError::new(
                    "22001",
                    format!("string '{s}' too long for type {target}"),
                ));
            }
            Ok(Value::Text(s))
        }
        (DataType::Text | DataType::Varchar(_), v @ (Value::Geometry(_) | Value::Bytes(_))) => {
            Err(mismatch(&v, target))
        }
        (DataType::Text | DataType::Varchar(_), v) => {
            cast_value_to_type(Value::Text(v.to_string()), target)
        }
        (DataType::Bool, v) => match &v {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Int64(i) => Ok(Value::Bool(*i != 0)),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch(&v, target)),
            },
            _ => Err(mismatch(&v, target)),
        },
        (DataType::Date, Value::Date(d)) => Ok(Value::Date(d)),
        (DataType::Date, v @ Value::Int64(_)) => {
            let days = v.as_i64().unwrap_or_default();
            i32::try_from(days)
                .map(Value::Date)
                .map_err(|_| out_of_range(&v, target))
        }
        (DataType::Timestamp, Value::TimestampMicros(m)) => Ok(Value::TimestampMicros(m)),
        (DataType::Timestamp, Value::Int64(m)) => Ok(Value::TimestampMicros(m)),
        (DataType::Bytea, Value::Bytes(b)) => Ok(Value::Bytes(b)),
        (DataType::Bytea, Value::Text(s)) => Ok(Value::Bytes(s.into_bytes())),
        (DataType::Geometry { srid }, Value::Geometry(g)) => {
            if let Some(expected) = srid
                && *expected != g.srid
            {
                return Err(SqlError::new(
                    "22023",
                    format!(
                        "the SRID of the geometry is {}, but the SRID of the column is {}",
                        g.srid, expected
                    ),
                ));
            }
            Ok(Value::Geometry(g))
        }
        (dt, got) => Err(mismatch(&got, dt)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Concat,
}

type ScalarFnImpl = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;

/// A named scalar function supplied by the expression layer.
#[derive(Clone)]
pub struct ScalarFn {
    name: String,
    func: Arc<ScalarFnImpl>,
}

impl ScalarFn {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ScalarFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}()", self.name)
    }
}

impl PartialEq for ScalarFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

/// Column default expression. Column references are bound by ordinal and
/// rebound by name whenever the owning schema is renumbered.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultExpr {
    Literal(Value),
    Column {
        index: usize,
        name: String,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<DefaultExpr>,
        right: Box<DefaultExpr>,
    },
    Func {
        func: ScalarFn,
        args: Vec<DefaultExpr>,
    },
}

impl DefaultExpr {
    pub fn literal(v: impl Into<Value>) -> Self {
        DefaultExpr::Literal(v.into())
    }

    pub fn column(index: usize, name: impl Into<String>) -> Self {
        DefaultExpr::Column {
            index,
            name: name.into(),
        }
    }

    pub fn eval(&self, row: &[Value]) -> anyhow::Result<Value> {
        match self {
            DefaultExpr::Literal(v) => Ok(v.clone()),
            DefaultExpr::Column { index, name } => row.get(*index).cloned().ok_or_else(|| {
                sql_err(
                    "42703",
                    format!("default references column {name} at missing ordinal {index}"),
                )
            }),
            DefaultExpr::BinaryOp { op, left, right } => {
                let l = left.eval(row)?;
                let r = right.eval(row)?;
                eval_binary(*op, l, r)
            }
            DefaultExpr::Func { func, args } => {
                let vals = args
                    .iter()
                    .map(|a| a.eval(row))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                (func.func)(&vals)
            }
        }
    }

    // resolve is given a column name and returns its ordinal in the new layout
    pub fn rebind(&self, resolve: &impl Fn(&str) -> Option<usize>) -> DefaultExpr {
        match self {
            DefaultExpr::Literal(v) => DefaultExpr::Literal(v.clone()),
            DefaultExpr::Column { index, name } => DefaultExpr::Column {
                index: resolve(name).unwrap_or(*index),
                name: name.clone(),
            },
            DefaultExpr::BinaryOp { op, left, right } => DefaultExpr::BinaryOp {
                op: *op,
                left: Box::new(left.rebind(resolve)),
                right: Box::new(right.rebind(resolve)),
            },
            DefaultExpr::Func { func, args } => DefaultExpr::Func {
                func: func.clone(),
                args: args.iter().map(|a| a.rebind(resolve)).collect(),
            },
        }
    }

    pub fn referenced_columns(&self) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<(usize, String)>) {
        match self {
            DefaultExpr::Literal(_) => {}
            DefaultExpr::Column { index, name } => out.push((*index, name.clone())),
            DefaultExpr::BinaryOp { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            DefaultExpr::Func { args, .. } => {
                for a in args {
                    a.collect_columns(out);
                }
            }
        }
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> anyhow::Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    match op {
        BinaryOp::Concat => Ok(Value::Text(format!("{l}{r}"))),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
            if let (Value::Int64(a), Value::Int64(b)) = (&l, &r) {
                let res = match op {
                    BinaryOp::Add => a.checked_add(*b),
                    BinaryOp::Sub => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                return res
                    .map(Value::Int64)
                    .ok_or_else(|| sql_err("22003", "bigint out of range"));
            }
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Err(sql_err("42804", format!("cannot apply arithmetic to {l} and {r}")));
            };
            Ok(Value::from_f64(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            }))
        }
    }
}

/// Opaque row predicate supplied by the expression layer.
pub trait RowPredicate: Send + Sync {
    fn eval(&self, row: &[Value]) -> anyhow::Result<bool>;

    // (table, column) pairs the predicate reads; empty means unknown
    fn columns(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn describe(&self) -> String {
        "<predicate>".to_string()
    }
}

struct FnPredicate<F> {
    label: String,
    func: F,
}

impl<F> RowPredicate for FnPredicate<F>
where
    F: Fn(&[Value]) -> anyhow::Result<bool> + Send + Sync,
{
    fn eval(&self, row: &[Value]) -> anyhow::Result<bool> {
        (self.func)(row)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// `table.column <op> literal`, the shape the planner pushes down most often.
#[derive(Clone, Debug)]
pub struct ColumnCmp {
    pub table: String,
    pub column: String,
    pub index: usize,
    pub op: CmpOp,
    pub value: Value,
}

impl RowPredicate for ColumnCmp {
    fn eval(&self, row: &[Value]) -> anyhow::Result<bool> {
        let lhs = row.get(self.index).ok_or_else(|| {
            sql_err(
                "42703",
                format!("filter column {} at missing ordinal {}", self.column, self.index),
            )
        })?;
        let Some(ord) = compare_values(lhs, &self.value) else {
            return Ok(false);
        };
        Ok(match self.op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::NotEq => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::LtEq => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::GtEq => ord != Ordering::Less,
        })
    }

    fn columns(&self) -> Vec<(String, String)> {
        vec![(self.table.clone(), self.column.clone())]
    }

    fn describe(&self) -> String {
        format!("{}.{} {:?} {}", self.table, self.column, self.op, self.value)
    }
}

#[derive(Clone)]
pub struct Predicate(Arc<dyn RowPredicate>);

impl Predicate {
    pub fn new(p: impl RowPredicate + 'static) -> Self {
        Predicate(Arc::new(p))
    }

    pub fn from_fn(
        label: impl Into<String>,
        func: impl Fn(&[Value]) -> anyhow::Result<bool> + Send + Sync + 'static,
    ) -> Self {
        Predicate(Arc::new(FnPredicate {
            label: label.into(),
            func,
        }))
    }

    pub fn eval(&self, row: &[Value]) -> anyhow::Result<bool> {
        self.0.eval(row)
    }

    pub fn columns(&self) -> Vec<(String, String)> {
        self.0.columns()
    }

    pub fn describe(&self) -> String {
        self.0.describe()
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
