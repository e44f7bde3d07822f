use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ConstraintViolation,
    InvalidOperation,
    // a collaborator wired the table incorrectly; not recoverable by retrying
    Fatal,
    Internal,
}

#[derive(Debug)]
pub struct SqlError {
    pub code: &'static str,
    pub message: String,
}

impl SqlError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.code {
            "42P01" | "42704" | "42703" => ErrorKind::NotFound,
            "42P07" | "42710" => ErrorKind::AlreadyExists,
            "22001" | "22003" | "22023" | "2BP01" => ErrorKind::ConstraintViolation,
            code if code.starts_with("23") => ErrorKind::ConstraintViolation,
            "F0000" => ErrorKind::Fatal,
            "XX000" => ErrorKind::Internal,
            _ => ErrorKind::InvalidOperation,
        }
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SqlError {}

pub(crate) fn sql_err(code: &'static str, msg: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(SqlError::new(code, msg.into()))
}

/// Classifies an error produced by this crate, `None` for foreign errors.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<SqlError>().map(SqlError::kind)
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataType {
    Int4,
    Int8,
    Float8,
    Text,
    Varchar(u32),
    Bool,
    Date,
    Timestamp,
    Bytea,
    Geometry { srid: Option<u32> },
}

impl DataType {
    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Text | DataType::Varchar(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int4 | DataType::Int8)
    }

    pub fn zero(&self) -> Value {
        match self {
            DataType::Int4 | DataType::Int8 => Value::Int64(0),
            DataType::Float8 => Value::from_f64(0.0),
            DataType::Text | DataType::Varchar(_) => Value::Text(String::new()),
            DataType::Bool => Value::Bool(false),
            DataType::Date => Value::Date(0),
            DataType::Timestamp => Value::TimestampMicros(0),
            DataType::Bytea => Value::Bytes(Vec::new()),
            DataType::Geometry { srid } => {
                Value::Geometry(Geometry::point(0.0, 0.0).with_srid(srid.unwrap_or(0)))
            }
        }
    }

    // rough per-row storage width used for data length estimates
    pub(crate) fn byte_width(&self) -> u64 {
        match self {
            DataType::Int4 | DataType::Int8 | DataType::Float8 => 8,
            DataType::Varchar(n) => u64::from(*n) * 4,
            DataType::Text => 65_535,
            DataType::Bool => 1,
            DataType::Date | DataType::Timestamp => 8,
            DataType::Bytea => 65_535,
            DataType::Geometry { .. } => 0,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int4 => f.write_str("int"),
            DataType::Int8 => f.write_str("bigint"),
            DataType::Float8 => f.write_str("double"),
            DataType::Text => f.write_str("text"),
            DataType::Varchar(n) => write!(f, "varchar({n})"),
            DataType::Bool => f.write_str("boolean"),
            DataType::Date => f.write_str("date"),
            DataType::Timestamp => f.write_str("timestamp"),
            DataType::Bytea => f.write_str("blob"),
            DataType::Geometry { srid: Some(srid) } => write!(f, "geometry srid {srid}"),
            DataType::Geometry { srid: None } => f.write_str("geometry"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Geometry {
    pub srid: u32,
    pub points: Vec<(f64, f64)>,
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            srid: 0,
            points: vec![(x, y)],
        }
    }

    pub fn line(points: Vec<(f64, f64)>) -> Self {
        Self { srid: 0, points }
    }

    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = srid;
        self
    }

    /// Axis-aligned bounding box as `(min_x, min_y, max_x, max_y)`.
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in &self.points {
            min_x = min_x.min(*x);
            min_y = min_y.min(*y);
            max_x = max_x.max(*x);
            max_y = max_y.max(*y);
        }
        (min_x, min_y, max_x, max_y)
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Int64(i64),
    Float64Bits(u64),
    Text(String),
    Bool(bool),
    Date(i32),
    TimestampMicros(i64),
    Bytes(Vec<u8>),
    Geometry(Geometry),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Int64(a), Int64(b)) => a == b,
            (Float64Bits(a), Float64Bits(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (TimestampMicros(a), TimestampMicros(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Geometry(a), Geometry(b)) => {
                a.srid == b.srid
                    && a.points.len() == b.points.len()
                    && a.points.iter().zip(b.points.iter()).all(|(p, q)| {
                        p.0.to_bits() == q.0.to_bits() && p.1.to_bits() == q.1.to_bits()
                    })
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Value::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Null => {}
            Int64(v) => v.hash(state),
            Float64Bits(v) => v.hash(state),
            Text(s) => s.hash(state),
            Bool(b) => b.hash(state),
            Date(d) => d.hash(state),
            TimestampMicros(t) => t.hash(state),
            Bytes(b) => b.hash(state),
            Geometry(g) => {
                g.srid.hash(state);
                for (x, y) in &g.points {
                    x.to_bits().hash(state);
                    y.to_bits().hash(state);
                }
            }
        }
    }
}

impl Value {
    pub fn from_f64(f: f64) -> Self {
        Value::Float64Bits(f.to_bits())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64Bits(b) => Some(f64::from_bits(*b)),
            Value::Int64(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64Bits(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "date({d})"),
            Value::TimestampMicros(t) => write!(f, "timestamp({t})"),
            Value::Bytes(b) => {
                f.write_str("0x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Geometry(g) => {
                write!(f, "geometry(srid={}", g.srid)?;
                for (x, y) in &g.points {
                    write!(f, " {x} {y}")?;
                }
                f.write_str(")")
            }
        }
    }
}
