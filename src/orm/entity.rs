//! Records: entity instances bound to a [`TableSchema`], with CRUD built on
//! the connection pool and the schema's SQL templates.

use super::field::FieldDefault;
use super::schema::TableSchema;
use crate::db::{Db, DbError, Row, Value, PLACEHOLDER};
use crate::logger;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Write to a field the schema does not declare. A programming error; record
/// fields are closed over the schema, with no dynamic fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("table `{table}` has no field `{field}`")]
pub struct UnknownField {
    pub table: String,
    pub field: String,
}

/// LIMIT clause shape: a plain row count, or an offset/count pair.
///
/// The enum is the whole contract; no other limit shape is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    OffsetCount(u64, u64),
}

/// Options for [`Record::find_all`].
#[derive(Debug, Clone, Default)]
pub struct Query {
    where_clause: Option<String>,
    args: Vec<Value>,
    order_by: Option<String>,
    limit: Option<Limit>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `WHERE` body, each placeholder matched by an argument, e.g.
    /// `filter("admin=? AND name=?", vec![...])`.
    pub fn filter(mut self, where_clause: &str, args: Vec<Value>) -> Self {
        self.where_clause = Some(where_clause.to_string());
        self.args = args;
        self
    }

    /// Raw `ORDER BY` body, e.g. `order_by("created_at DESC")`.
    pub fn order_by(mut self, order: &str) -> Self {
        self.order_by = Some(order.to_string());
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    pub fn page(mut self, offset: u64, count: u64) -> Self {
        self.limit = Some(Limit::OffsetCount(offset, count));
        self
    }
}

/// One entity instance: a field-name/value mapping sharing its type's
/// [`TableSchema`] by reference.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<TableSchema>,
    values: BTreeMap<String, Value>,
}

impl Record {
    /// A record with every field unset.
    pub fn new(schema: &Arc<TableSchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            values: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Set a declared field (primary key included). Unknown names are
    /// rejected instead of silently stored.
    pub fn set(
        &mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, UnknownField> {
        if self.schema.field(field).is_none() {
            return Err(UnknownField {
                table: self.schema.table().to_string(),
                field: field.to_string(),
            });
        }
        self.values.insert(field.to_string(), value.into());
        Ok(self)
    }

    /// Current value of a field; `None` when unset.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Materialize a database row. Only columns the schema declares are
    /// adopted; on duplicate column names the first occurrence wins.
    fn from_row(schema: &Arc<TableSchema>, row: Row) -> Self {
        let mut values = BTreeMap::new();
        for (name, value) in row.into_pairs() {
            if schema.field(&name).is_some() {
                values.entry(name).or_insert(value);
            }
        }
        Self {
            schema: Arc::clone(schema),
            values,
        }
    }

    /// Fetch one record by primary key; `None` when no row matches.
    pub async fn find(
        db: &Db,
        schema: &Arc<TableSchema>,
        pk: impl Into<Value>,
    ) -> Result<Option<Self>, DbError> {
        let sql = format!(
            "{} WHERE `{}`={PLACEHOLDER}",
            schema.templates().select,
            schema.primary_key().name
        );
        let mut rows = db.select(&sql, vec![pk.into()], Some(1)).await?;
        Ok(rows.pop().map(|row| Self::from_row(schema, row)))
    }

    /// Fetch all records matching `query`.
    pub async fn find_all(
        db: &Db,
        schema: &Arc<TableSchema>,
        query: Query,
    ) -> Result<Vec<Self>, DbError> {
        let (sql, args) = build_find_all(schema, query);
        let rows = db.select(&sql, args, None).await?;
        Ok(rows
            .into_iter()
            .map(|row| Self::from_row(schema, row))
            .collect())
    }

    /// `SELECT count(field)`, optionally filtered. `None` when the aggregate
    /// query yields no rows at all.
    pub async fn count(
        db: &Db,
        schema: &Arc<TableSchema>,
        field: &str,
        where_clause: Option<&str>,
        args: Vec<Value>,
    ) -> Result<Option<i64>, DbError> {
        let mut sql = format!("SELECT count({field}) AS _num_ FROM `{}`", schema.table());
        if let Some(clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        let rows = db.select(&sql, args, None).await?;
        Ok(rows.first().and_then(|row| row.get("_num_")?.as_i64()))
    }

    /// Fetch one approximately random record; `None` on an empty table.
    ///
    /// Sampling is biased toward rows following a gap in the key space; see
    /// the schema's random template.
    pub async fn random_one(
        db: &Db,
        schema: &Arc<TableSchema>,
    ) -> Result<Option<Self>, DbError> {
        let mut rows = db
            .select(&schema.templates().random, Vec::new(), Some(1))
            .await?;
        Ok(rows.pop().map(|row| Self::from_row(schema, row)))
    }

    /// Insert this record.
    ///
    /// Unset non-key fields fall back to their declared defaults (invoking
    /// zero-arg generators), and the resolved value is kept on the record.
    /// The key column is not part of the insert; the database generates the
    /// key, and the generated value is always assigned to the record's
    /// primary key, so the in-memory key matches the stored row even when a
    /// key had been set by hand before saving. An affected-row count other
    /// than 1 is logged, not raised.
    pub async fn save(&mut self, db: &Db) -> Result<(), DbError> {
        let schema = Arc::clone(&self.schema);
        let mut args = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            args.push(self.value_or_default(&field.name));
        }
        let result = db.execute(&schema.templates().insert, args).await?;
        self.values.insert(
            schema.primary_key().name.clone(),
            Value::Integer(result.last_insert_id),
        );
        if result.rows_affected != 1 {
            logger::log_rows_mismatch("insert", schema.table(), result.rows_affected);
        }
        Ok(())
    }

    /// Update the row with this primary key to the record's current values
    /// (no default fallback; unset fields write NULL). An affected-row count
    /// other than 1 is logged, not raised.
    pub async fn update(&self, db: &Db) -> Result<(), DbError> {
        let schema = &self.schema;
        let mut args: Vec<Value> = schema
            .fields()
            .iter()
            .map(|f| self.get(&f.name).cloned().unwrap_or(Value::Null))
            .collect();
        args.push(
            self.get(&schema.primary_key().name)
                .cloned()
                .unwrap_or(Value::Null),
        );
        let result = db.execute(&schema.templates().update, args).await?;
        if result.rows_affected != 1 {
            logger::log_rows_mismatch("update", schema.table(), result.rows_affected);
        }
        Ok(())
    }

    /// Delete the row with this primary key. An affected-row count other
    /// than 1 is logged, not raised.
    pub async fn remove(&self, db: &Db) -> Result<(), DbError> {
        let schema = &self.schema;
        let args = vec![self
            .get(&schema.primary_key().name)
            .cloned()
            .unwrap_or(Value::Null)];
        let result = db.execute(&schema.templates().delete, args).await?;
        if result.rows_affected != 1 {
            logger::log_rows_mismatch("delete", schema.table(), result.rows_affected);
        }
        Ok(())
    }

    fn value_or_default(&mut self, field: &str) -> Value {
        if let Some(value) = self.values.get(field) {
            return value.clone();
        }
        let default = self
            .schema
            .field(field)
            .and_then(|f| f.default.as_ref())
            .map(FieldDefault::resolve);
        match default {
            Some(value) => {
                logger::log_default_applied(field);
                self.values.insert(field.to_string(), value.clone());
                value
            }
            None => Value::Null,
        }
    }
}

fn build_find_all(schema: &Arc<TableSchema>, query: Query) -> (String, Vec<Value>) {
    let mut sql = vec![schema.templates().select.clone()];
    let mut args = query.args;
    if let Some(clause) = query.where_clause {
        sql.push("WHERE".to_string());
        sql.push(clause);
    }
    if let Some(order) = query.order_by {
        sql.push("ORDER BY".to_string());
        sql.push(order);
    }
    match query.limit {
        Some(Limit::Count(n)) => {
            sql.push(format!("LIMIT {PLACEHOLDER}"));
            args.push(Value::Integer(n as i64));
        }
        Some(Limit::OffsetCount(offset, n)) => {
            // Limit arguments always follow the where arguments.
            sql.push(format!("LIMIT {PLACEHOLDER}, {PLACEHOLDER}"));
            args.push(Value::Integer(offset as i64));
            args.push(Value::Integer(n as i64));
        }
        None => {}
    }
    (sql.join(" "), args)
}
