//! Logger module
//!
//! Timestamped logging for server lifecycle, request dispatch, and database
//! operations. Writes to stdout/stderr until [`init`] points it at files.

pub mod writer;

use crate::config::LoggingConfig;
use chrono::Local;
use hyper::Method;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether debug-level messages are emitted; set once at [`init`].
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize the logger with configuration.
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    DEBUG_ENABLED.store(config.level.eq_ignore_ascii_case("debug"), Ordering::Relaxed);
    writer::init(
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
    )
}

fn stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn write_info(message: &str) {
    let line = format!("{} {message}", stamp());
    match writer::get() {
        Some(w) => w.write_info(&line),
        None => println!("{line}"),
    }
}

fn write_error(message: &str) {
    let line = format!("{} {message}", stamp());
    match writer::get() {
        Some(w) => w.write_error(&line),
        None => eprintln!("{line}"),
    }
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_debug(message: &str) {
    if DEBUG_ENABLED.load(Ordering::Relaxed) {
        write_info(&format!("[DEBUG] {message}"));
    }
}

pub fn log_server_start(addr: &SocketAddr) {
    write_info("======================================");
    write_info("Server started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info("======================================");
}

pub fn log_server_stop() {
    write_info("Server stopped");
}

pub fn log_route_registered(method: &Method, path: &str, name: &str) {
    write_info(&format!("[ROUTE] {method} {path} => {name}"));
}

pub fn log_route_replaced(method: &Method, path: &str, name: &str) {
    write_error(&format!(
        "[WARN] Route {method} {path} registered twice; earlier handler {name} replaced"
    ));
}

pub fn log_request(method: &Method, path: &str) {
    log_debug(&format!("[REQ] {method} {path}"));
}

pub fn log_param_collision(name: &str) {
    write_error(&format!(
        "[WARN] Path parameter overrides request parameter: {name}"
    ));
}

pub fn log_unhandled_error(route: &str, detail: &str) {
    write_error(&format!("[ERROR] Unhandled error in {route}: {detail}"));
}

pub fn log_pool_open(driver: &str, database: &str, min: usize, max: usize) {
    write_info(&format!(
        "[DB] Connection pool open: driver={driver} database={database} size={min}..{max}"
    ));
}

pub fn log_pool_close() {
    write_info("[DB] Connection pool closed");
}

pub fn log_sql(sql: &str, arg_count: usize) {
    log_debug(&format!("[SQL] {sql} ({arg_count} args)"));
}

pub fn log_default_applied(field: &str) {
    log_debug(&format!("[ORM] Using declared default for field: {field}"));
}

/// CRUD row-count mismatches are logged, never raised; callers must not
/// assume success implies a row changed.
pub fn log_rows_mismatch(op: &str, table: &str, rows: u64) {
    write_error(&format!(
        "[WARN] {op} on `{table}` affected {rows} rows (expected 1)"
    ));
}
