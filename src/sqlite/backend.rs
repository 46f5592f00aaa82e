use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tokio::task::spawn_blocking;

use crate::dialect::{DefaultDialect, Dialect, Statement};
use crate::driver::{Backend, DriverTransaction};
use crate::error::SqlDepotError;
use crate::types::DatabaseType;
use crate::values::Values;

use super::config::{SharedSqliteConnection, SqliteManager};
use super::params::Params;
use super::query::{collect_rows, execute_statement};
use super::run_blocking;

/// `SQLite` backend over a bb8 pool of rusqlite connections.
pub struct SqliteBackend {
    pool: Mutex<Option<Pool<SqliteManager>>>,
}

impl SqliteBackend {
    #[must_use]
    pub fn from_pool(pool: Pool<SqliteManager>) -> Self {
        Self {
            pool: Mutex::new(Some(pool)),
        }
    }

    fn pool(&self) -> Result<Pool<SqliteManager>, SqlDepotError> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| SqlDepotError::ConnectionError("sqlite pool closed".into()))
    }
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.pool.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(Pool::state);
        f.debug_struct("SqliteBackend")
            .field("connections", &state.map(|s| s.connections))
            .finish()
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn default_dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(DefaultDialect)
    }

    async fn begin(&self) -> Result<Box<dyn DriverTransaction>, SqlDepotError> {
        let conn = self.pool()?.get_owned().await.map_err(|e| {
            SqlDepotError::ConnectionError(format!("sqlite checkout error: {e}"))
        })?;
        run_blocking(Arc::clone(&*conn), |guard| {
            guard
                .execute_batch("BEGIN")
                .map_err(SqlDepotError::SqliteError)
        })
        .await?;
        Ok(Box::new(SqliteTransaction {
            conn: Some(conn),
            needs_rollback: true,
        }))
    }

    async fn close(&self) {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Open transaction holding its pooled connection until dropped.
struct SqliteTransaction {
    conn: Option<PooledConnection<'static, SqliteManager>>,
    /// True while the transaction is open and must be rolled back if dropped.
    needs_rollback: bool,
}

impl SqliteTransaction {
    fn conn_handle(&self) -> Result<SharedSqliteConnection, SqlDepotError> {
        self.conn
            .as_ref()
            .map(|c| Arc::clone(&**c))
            .ok_or(SqlDepotError::TransactionClosed)
    }

    async fn query(
        &self,
        stmt: &Statement,
        names: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<Values>, SqlDepotError> {
        let params = Params::convert(&stmt.args);
        let sql = stmt.sql.clone();
        let names = names.to_vec();
        run_blocking(self.conn_handle()?, move |guard| {
            collect_rows(guard, &sql, &params, &names, limit)
        })
        .await
    }

    async fn finish(&mut self, sql: &'static str) -> Result<(), SqlDepotError> {
        let handle = self.conn_handle()?;
        let result = run_blocking(handle, move |guard| {
            guard.execute_batch(sql).map_err(SqlDepotError::SqliteError)
        })
        .await;
        if result.is_ok() {
            self.needs_rollback = false;
        }
        result
    }
}

#[async_trait]
impl DriverTransaction for SqliteTransaction {
    async fn fetch_optional(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Option<Values>, SqlDepotError> {
        Ok(self.query(stmt, names, Some(1)).await?.into_iter().next())
    }

    async fn fetch_all(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Vec<Values>, SqlDepotError> {
        self.query(stmt, names, None).await
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, SqlDepotError> {
        let params = Params::convert(&stmt.args);
        let sql = stmt.sql.clone();
        run_blocking(self.conn_handle()?, move |guard| {
            execute_statement(guard, &sql, &params)
        })
        .await
    }

    async fn commit(&mut self) -> Result<(), SqlDepotError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlDepotError> {
        let result = self.finish("ROLLBACK").await;
        // A failed ROLLBACK leaves nothing to retry on drop.
        self.needs_rollback = false;
        result
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.needs_rollback
            && let Some(conn) = self.conn.take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            handle.spawn(async move {
                let conn_handle = Arc::clone(&*conn);
                let result = spawn_blocking(move || {
                    let guard = conn_handle.blocking_lock();
                    guard.execute_batch("ROLLBACK")
                })
                .await;
                if let Ok(Err(err)) = result {
                    tracing::warn!("sqlite rollback on drop failed: {}", err);
                }
                drop(conn);
            });
        }
    }
}
