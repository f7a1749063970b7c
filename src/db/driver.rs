//! Driver seam: the traits a database backend implements, plus the bundled
//! SQLite driver.

use super::{DbError, Row, Value, PLACEHOLDER};
use crate::config::DbConfig;
use rusqlite::types::{ToSqlOutput, ValueRef};
use std::sync::Arc;
use std::time::Duration;

/// Result of one write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Auto-generated key of the inserted row, when the statement inserted one.
    pub last_insert_id: i64,
    pub rows_affected: u64,
}

/// One live database connection.
///
/// Statements arrive already translated to the driver's native syntax.
pub trait Connection: Send {
    fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, DbError>;

    /// Run a query, returning up to `limit` rows (all rows when `None`) as
    /// ordered column-name/value mappings.
    fn query(&mut self, sql: &str, args: &[Value], limit: Option<usize>)
        -> Result<Vec<Row>, DbError>;
}

/// A database backend: connection factory plus SQL dialect translation.
pub trait Driver: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Reject unusable configuration before any connection is attempted.
    fn check_config(&self, cfg: &DbConfig) -> Result<(), DbError>;

    fn connect(&self, cfg: &DbConfig) -> Result<Box<dyn Connection>, DbError>;

    /// Translate portable SQL (the `?` placeholder and the `RAND()` sampling
    /// function) into this driver's native syntax.
    fn translate(&self, sql: &str) -> String;
}

/// Replace every portable placeholder with the driver's native marker.
///
/// The replacement is textual, matching the portable-template contract: SQL
/// templates never contain a literal placeholder character outside a
/// parameter slot.
pub fn translate_placeholders(sql: &str, native: &str) -> String {
    sql.replace(PLACEHOLDER, native)
}

/// SQLite driver over rusqlite.
///
/// `db.database` is a filesystem path, or `:memory:` for a private in-memory
/// database (only meaningful with a pool of size 1, since every connection
/// would otherwise see its own database). `db.host`, `db.port`, `db.user` and
/// `db.password` are ignored; `db.charset` must be a UTF-8 variant and
/// `db.autocommit` must stay enabled because every statement autocommits.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn check_config(&self, cfg: &DbConfig) -> Result<(), DbError> {
        if cfg.database.is_empty() {
            return Err(DbError::Config("db.database is required".to_string()));
        }
        if !cfg.autocommit {
            return Err(DbError::Config(
                "sqlite driver requires db.autocommit = true".to_string(),
            ));
        }
        if !cfg.charset.to_ascii_lowercase().starts_with("utf8") {
            return Err(DbError::Config(format!(
                "sqlite driver only supports utf8 charsets, got `{}`",
                cfg.charset
            )));
        }
        Ok(())
    }

    fn connect(&self, cfg: &DbConfig) -> Result<Box<dyn Connection>, DbError> {
        let conn = if cfg.database == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&cfg.database)
        }
        .map_err(sqlite_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(sqlite_err)?;
        Ok(Box::new(SqliteConnection { conn }))
    }

    fn translate(&self, sql: &str) -> String {
        // SQLite's native placeholder is already `?`; only the sampling
        // function needs a dialect rewrite (RANDOM() is an int64, scaled
        // here to [0, 1) like RAND()).
        sql.replace("RAND()", "(ABS(RANDOM()) / 9223372036854775808.0)")
    }
}

struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(sqlite_err)?;
        let rows_affected = stmt
            .execute(rusqlite::params_from_iter(args.iter()))
            .map_err(sqlite_err)? as u64;
        Ok(ExecResult {
            last_insert_id: self.conn.last_insert_rowid(),
            rows_affected,
        })
    }

    fn query(
        &mut self,
        sql: &str,
        args: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Row>, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(sqlite_err)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .into();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(args.iter()))
            .map_err(sqlite_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(sqlite_err)? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(read_value(row.get_ref(i).map_err(sqlite_err)?));
            }
            out.push(Row::new(Arc::clone(&columns), values));
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
        }
        Ok(out)
    }
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

fn sqlite_err(err: rusqlite::Error) -> DbError {
    DbError::Driver(err.to_string())
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Self::Real(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}
