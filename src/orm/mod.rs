//! Declarative persistence: schema fields, per-type entity descriptors with
//! canned SQL templates, and record CRUD over the connection pool.

mod entity;
mod field;
mod schema;

pub use entity::{Limit, Query, Record, UnknownField};
pub use field::{FieldDef, FieldDefault, FieldKind};
pub use schema::{SchemaError, SqlTemplates, TableSchema};
