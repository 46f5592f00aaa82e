use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool};
use tokio::task::spawn_blocking;

use crate::config::Options;
use crate::depot::Depot;
use crate::dialect::Dialect;
use crate::error::SqlDepotError;

use super::backend::SqliteBackend;
use super::run_blocking;

/// A pooled `SQLite` connection. The mutex is taken with `blocking_lock` inside
/// `spawn_blocking`, never across an await.
pub type SharedSqliteConnection = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

const MEMORY_PATH: &str = ":memory:";

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Maximum pooled connections. `:memory:` databases are private to one connection, so
    /// their pool is capped at 1.
    pub pool_size: u32,
    pub busy_timeout: Duration,
    /// Switch the database to write-ahead logging when a connection opens.
    pub wal: bool,
    pub options: Options,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: 4,
            busy_timeout: Duration::from_secs(5),
            wal: true,
            options: Options::default(),
        }
    }

    fn effective_pool_size(&self) -> u32 {
        if self.db_path == MEMORY_PATH {
            1
        } else {
            self.pool_size.max(1)
        }
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.opts.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn log_sql(mut self, log_sql: bool) -> Self {
        self.opts.options.log_sql = log_sql;
        self
    }

    #[must_use]
    pub fn dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.opts.options.dialect = Some(Arc::new(dialect));
        self
    }

    /// Replace the backend-independent options wholesale.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.opts.options = options;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a `Depot` backed by a `SQLite` pool.
    ///
    /// # Errors
    ///
    /// Returns `SqlDepotError` if pool creation or the initial smoke test fails.
    pub async fn build(self) -> Result<Depot, SqlDepotError> {
        let opts = self.finish();
        let options = opts.options.clone();
        let backend = SqliteBackend::connect(&opts).await?;
        Ok(Depot::new(Arc::new(backend), options))
    }
}

/// bb8 manager for rusqlite connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
    wal: bool,
}

impl SqliteManager {
    #[must_use]
    pub fn new(opts: &SqliteOptions) -> Self {
        Self {
            db_path: opts.db_path.clone(),
            busy_timeout: opts.busy_timeout,
            wal: opts.wal,
        }
    }

    /// Build a pool from this manager and check out one connection as a smoke test.
    ///
    /// # Errors
    /// Returns `SqlDepotError::ConnectionError` if the database cannot be opened.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<SqliteManager>, SqlDepotError> {
        let pool = Pool::builder()
            .max_size(max_size)
            .build(self)
            .await
            .map_err(|e| SqlDepotError::ConnectionError(format!("sqlite pool error: {e}")))?;
        {
            let conn = pool.get().await.map_err(|e| {
                SqlDepotError::ConnectionError(format!("sqlite checkout error: {e}"))
            })?;
            run_blocking(Arc::clone(&*conn), |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(SqlDepotError::SqliteError)
            })
            .await?;
        }
        Ok(pool)
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlDepotError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let manager = self.clone();
        async move {
            spawn_blocking(move || -> Result<SharedSqliteConnection, SqlDepotError> {
                let conn = rusqlite::Connection::open(&manager.db_path)?;
                conn.busy_timeout(manager.busy_timeout)?;
                if manager.wal && manager.db_path != MEMORY_PATH {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                tracing::debug!("sqlite connection opened path={}", manager.db_path);
                Ok(Arc::new(tokio::sync::Mutex::new(conn)))
            })
            .await
            .map_err(|e| SqlDepotError::ConnectionError(format!("sqlite open join error: {e}")))?
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(SqlDepotError::SqliteError)
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

impl SqliteBackend {
    pub(crate) async fn connect(opts: &SqliteOptions) -> Result<Self, SqlDepotError> {
        let pool = SqliteManager::new(opts)
            .build_pool(opts.effective_pool_size())
            .await?;
        Ok(Self::from_pool(pool))
    }
}
