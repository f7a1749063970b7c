//! Bounded connection pool.
//!
//! Each database call acquires exactly one connection for its duration and
//! releases it before returning, so the pool's `max_size` bounds the number
//! of in-flight statements; callers beyond that bound suspend until a
//! connection frees. Release happens in a guard's `Drop`, so cancellation of
//! the surrounding task cannot leak pool capacity. Statements run on the
//! blocking thread pool so the driver never stalls the async scheduler.
//!
//! No timeout is enforced on acquisition or statement execution; a wedged
//! statement can hold a connection indefinitely.

use super::driver::{Connection, Driver, ExecResult};
use super::{DbError, Row, Value};
use crate::config::DbConfig;
use crate::logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct PoolInner {
    driver: Arc<dyn Driver>,
    cfg: DbConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn Connection>>>,
    closed: AtomicBool,
}

/// Handle to one connection pool. Cheap to clone; all clones share the pool.
#[derive(Clone)]
pub struct Db {
    inner: Arc<PoolInner>,
}

impl Db {
    /// Establish a bounded pool (`min_size..max_size` connections) against one
    /// database.
    ///
    /// Fails fatally when the driver rejects the configuration (missing
    /// credentials, unusable options) or when the initial `min_size`
    /// connections cannot be opened.
    pub async fn open(driver: impl Driver, cfg: DbConfig) -> Result<Self, DbError> {
        let driver: Arc<dyn Driver> = Arc::new(driver);
        driver.check_config(&cfg)?;
        if cfg.max_size == 0 || cfg.min_size > cfg.max_size {
            return Err(DbError::Config(format!(
                "invalid pool bounds: min_size={} max_size={}",
                cfg.min_size, cfg.max_size
            )));
        }

        let warm = {
            let driver = Arc::clone(&driver);
            let cfg = cfg.clone();
            tokio::task::spawn_blocking(move || {
                let mut conns = Vec::with_capacity(cfg.min_size);
                for _ in 0..cfg.min_size {
                    conns.push(driver.connect(&cfg)?);
                }
                Ok::<_, DbError>(conns)
            })
            .await
            .map_err(join_err)??
        };

        logger::log_pool_open(driver.name(), &cfg.database, cfg.min_size, cfg.max_size);
        let semaphore = Arc::new(Semaphore::new(cfg.max_size));
        Ok(Self {
            inner: Arc::new(PoolInner {
                driver,
                cfg,
                semaphore,
                idle: Mutex::new(warm),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Run one parametrized statement, returning the last inserted key and
    /// the affected-row count.
    pub async fn execute(&self, sql: &str, args: Vec<Value>) -> Result<ExecResult, DbError> {
        let sql = self.inner.driver.translate(sql);
        logger::log_sql(&sql, args.len());
        let mut conn = self.acquire().await?;
        conn.run(move |c| c.execute(&sql, &args)).await
    }

    /// Run one parametrized query, returning up to `limit` rows (all rows
    /// when `None`) as ordered column-name/value mappings.
    pub async fn select(
        &self,
        sql: &str,
        args: Vec<Value>,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, DbError> {
        let sql = self.inner.driver.translate(sql);
        logger::log_sql(&sql, args.len());
        let mut conn = self.acquire().await?;
        conn.run(move |c| c.query(&sql, &args, limit)).await
    }

    /// Drain and close all connections.
    ///
    /// Waits for in-flight statements to finish, then drops every pooled
    /// connection. Subsequent `execute`/`select` calls fail with
    /// [`DbError::Closed`]; reaching that state is a programming error in the
    /// caller's shutdown sequencing.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Collecting every permit waits out statements already holding one.
        let drained = self
            .inner
            .semaphore
            .acquire_many(self.inner.cfg.max_size as u32)
            .await;
        self.inner.semaphore.close();
        drop(drained);
        self.inner.idle.lock().unwrap().clear();
        logger::log_pool_close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    async fn acquire(&self) -> Result<PooledConn, DbError> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| DbError::Closed)?;
        let idle = self.inner.idle.lock().unwrap().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => {
                let driver = Arc::clone(&self.inner.driver);
                let cfg = self.inner.cfg.clone();
                tokio::task::spawn_blocking(move || driver.connect(&cfg))
                    .await
                    .map_err(join_err)??
            }
        };
        Ok(PooledConn {
            inner: Arc::clone(&self.inner),
            conn: Some(conn),
            _permit: permit,
        })
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.inner.idle.lock().unwrap().len()
    }
}

/// A checked-out connection; returns itself to the pool on drop.
struct PooledConn {
    inner: Arc<PoolInner>,
    conn: Option<Box<dyn Connection>>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConn {
    /// Run a statement on the blocking thread pool.
    ///
    /// The connection travels into the blocking task and back. If the
    /// surrounding future is cancelled mid-statement the connection is
    /// dropped with the task's result and the permit still frees on guard
    /// drop, so capacity is never lost.
    async fn run<R, F>(&mut self, f: F) -> Result<R, DbError>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn Connection) -> Result<R, DbError> + Send + 'static,
    {
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => return Err(DbError::Aborted("connection already taken".to_string())),
        };
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(conn.as_mut());
            (conn, result)
        })
        .await
        .map_err(join_err)?;
        self.conn = Some(conn);
        result
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if !self.inner.closed.load(Ordering::SeqCst) {
                self.inner.idle.lock().unwrap().push(conn);
            }
        }
    }
}

fn join_err(err: tokio::task::JoinError) -> DbError {
    DbError::Aborted(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Driver whose connections record statements and count opens.
    struct MemoryDriver {
        connects: Arc<AtomicUsize>,
    }

    struct MemoryConnection;

    impl Connection for MemoryConnection {
        fn execute(&mut self, _sql: &str, _args: &[Value]) -> Result<ExecResult, DbError> {
            Ok(ExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            })
        }

        fn query(
            &mut self,
            _sql: &str,
            _args: &[Value],
            _limit: Option<usize>,
        ) -> Result<Vec<Row>, DbError> {
            Ok(Vec::new())
        }
    }

    impl Driver for MemoryDriver {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn check_config(&self, _cfg: &DbConfig) -> Result<(), DbError> {
            Ok(())
        }

        fn connect(&self, _cfg: &DbConfig) -> Result<Box<dyn Connection>, DbError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemoryConnection))
        }

        fn translate(&self, sql: &str) -> String {
            // Exercises the portability seam with a non-native marker.
            crate::db::translate_placeholders(sql, "%s")
        }
    }

    fn memory_cfg(min: usize, max: usize) -> DbConfig {
        DbConfig {
            database: "memory".to_string(),
            min_size: min,
            max_size: max,
            ..DbConfig::default()
        }
    }

    #[tokio::test]
    async fn pool_reuses_connections() {
        let connects = Arc::new(AtomicUsize::new(0));
        let db = Db::open(
            MemoryDriver {
                connects: Arc::clone(&connects),
            },
            memory_cfg(1, 4),
        )
        .await
        .expect("open");

        db.execute("INSERT INTO t VALUES (?)", vec![Value::from(1i64)])
            .await
            .expect("first");
        db.execute("INSERT INTO t VALUES (?)", vec![Value::from(2i64)])
            .await
            .expect("second");

        // min_size warmed one connection; sequential calls reuse it.
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(db.idle_count(), 1);
    }

    #[tokio::test]
    async fn pool_bounds_in_flight_statements() {
        let connects = Arc::new(AtomicUsize::new(0));
        let db = Db::open(
            MemoryDriver {
                connects: Arc::clone(&connects),
            },
            memory_cfg(0, 2),
        )
        .await
        .expect("open");

        let mut tasks = Vec::new();
        for i in 0..8i64 {
            let db = db.clone();
            tasks.push(tokio::spawn(async move {
                db.execute("INSERT INTO t VALUES (?)", vec![Value::from(i)])
                    .await
            }));
        }
        for task in tasks {
            task.await.expect("join").expect("execute");
        }
        assert!(connects.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn closed_pool_rejects_statements() {
        let db = Db::open(
            MemoryDriver {
                connects: Arc::new(AtomicUsize::new(0)),
            },
            memory_cfg(1, 2),
        )
        .await
        .expect("open");

        db.close().await;
        assert!(db.is_closed());
        let err = db.select("SELECT 1", Vec::new(), None).await.unwrap_err();
        assert!(matches!(err, DbError::Closed));
        // close is idempotent
        db.close().await;
    }

    #[tokio::test]
    async fn invalid_pool_bounds_fail_at_open() {
        let result = Db::open(
            MemoryDriver {
                connects: Arc::new(AtomicUsize::new(0)),
            },
            memory_cfg(4, 2),
        )
        .await;
        assert!(matches!(result.err(), Some(DbError::Config(_))));
    }
}
