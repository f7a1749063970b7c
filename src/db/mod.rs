//! Database layer: portable values, the driver seam, and the bounded
//! connection pool.
//!
//! SQL text everywhere in this crate uses a single portable placeholder
//! character ([`PLACEHOLDER`]) for parameter slots. A [`Driver`] translates
//! that text to its native syntax before execution; this indirection is the
//! only DB-portability seam.

mod driver;
mod pool;

pub use driver::{translate_placeholders, Connection, Driver, ExecResult, SqliteDriver};
pub use pool::Db;

use std::fmt;
use std::sync::Arc;

/// Portable parameter-substitution marker in SQL strings.
pub const PLACEHOLDER: char = '?';

/// Database layer errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DbError {
    /// Pool/driver configuration is unusable; fatal at open time.
    #[error("database configuration error: {0}")]
    Config(String),
    /// The pool has been closed; executing through it is a programming error.
    #[error("connection pool is closed")]
    Closed,
    /// The underlying driver rejected a statement or connection attempt.
    #[error("driver error: {0}")]
    Driver(String),
    /// Runtime plumbing failed (blocking task aborted mid-statement).
    #[error("execution aborted: {0}")]
    Aborted(String),
}

/// A portable SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One result row: column values in select order, addressable by name.
///
/// Column names are shared across the rows of one result set.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values)
            .collect()
    }
}
