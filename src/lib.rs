//! loam — a minimal async web framework with declarative SQL persistence.
//!
//! Two subsystems:
//!
//! - [`web`]: a route registry binding `(method, path)` to async handler
//!   functions, each described by an explicit [`web::ParamSpec`] parameter
//!   contract, plus the per-request binder that extracts, filters and
//!   validates parameters before invoking the handler.
//! - [`orm`]: declarative table schemas ([`orm::TableSchema`]) generating SQL
//!   templates once per entity type, and [`orm::Record`] CRUD executing them
//!   through the bounded connection pool in [`db`].

pub mod api;
pub mod config;
pub mod db;
pub mod logger;
pub mod orm;
pub mod server;
pub mod web;

pub use api::{ApiError, HandlerError, Page};
pub use config::{Config, DbConfig, LoggingConfig, WebConfig};
pub use db::{Db, DbError, Row, SqliteDriver, Value};
pub use orm::{FieldDef, FieldKind, Limit, Query, Record, SchemaError, TableSchema};
pub use web::{HandlerArgs, ParamSpec, PathParams, Reply, RequestParts, Router};
