use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use futures_util::{TryStreamExt, pin_mut};

use crate::dialect::{Dialect, PostgresDialect, Statement};
use crate::driver::{Backend, DriverTransaction};
use crate::error::SqlDepotError;
use crate::row::materialize;
use crate::types::DatabaseType;
use crate::values::Values;

use super::config::PgManager;
use super::params::as_refs;
use super::query::PgRow;

/// `PostgreSQL` backend over a bb8 pool of `tokio_postgres` clients.
pub struct PostgresBackend {
    pool: Mutex<Option<Pool<PgManager>>>,
}

impl PostgresBackend {
    #[must_use]
    pub fn from_pool(pool: Pool<PgManager>) -> Self {
        Self {
            pool: Mutex::new(Some(pool)),
        }
    }

    fn pool(&self) -> Result<Pool<PgManager>, SqlDepotError> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| SqlDepotError::ConnectionError("postgres pool closed".into()))
    }
}

impl fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Pool::state);
        f.debug_struct("PostgresBackend")
            .field("connections", &state.map(|s| s.connections))
            .finish()
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn default_dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(PostgresDialect)
    }

    async fn begin(&self) -> Result<Box<dyn DriverTransaction>, SqlDepotError> {
        let conn = self.pool()?.get_owned().await?;
        conn.simple_query("BEGIN").await?;
        Ok(Box::new(PgTransaction {
            conn: Some(conn),
            needs_rollback: true,
        }))
    }

    async fn close(&self) {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Open transaction holding its pooled client until dropped.
struct PgTransaction {
    conn: Option<PooledConnection<'static, PgManager>>,
    needs_rollback: bool,
}

impl PgTransaction {
    fn client(&self) -> Result<&tokio_postgres::Client, SqlDepotError> {
        self.conn
            .as_deref()
            .ok_or(SqlDepotError::TransactionClosed)
    }

    /// Stream rows, stopping after `limit` when one is given.
    async fn query(
        &self,
        stmt: &Statement,
        names: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<Values>, SqlDepotError> {
        let stream = self
            .client()?
            .query_raw(stmt.sql.as_str(), stmt.args.iter())
            .await?;
        pin_mut!(stream);
        let mut rows = Vec::new();
        while limit.is_none_or(|max| rows.len() < max) {
            let Some(row) = stream.try_next().await? else {
                break;
            };
            rows.push(materialize(names, &PgRow(&row))?);
        }
        Ok(rows)
    }

    async fn finish(&mut self, action: &'static str) -> Result<(), SqlDepotError> {
        let result = self
            .client()?
            .simple_query(action)
            .await
            .map(|_| ())
            .map_err(|e| {
                SqlDepotError::ExecutionError(format!(
                    "postgres {} error: {e}",
                    action.to_ascii_lowercase()
                ))
            });
        if result.is_ok() {
            self.needs_rollback = false;
        }
        result
    }
}

#[async_trait]
impl DriverTransaction for PgTransaction {
    async fn fetch_optional(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Option<Values>, SqlDepotError> {
        Ok(self.query(stmt, names, Some(1)).await?.pop())
    }

    async fn fetch_all(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Vec<Values>, SqlDepotError> {
        self.query(stmt, names, None).await
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, SqlDepotError> {
        Ok(self
            .client()?
            .execute(stmt.sql.as_str(), &as_refs(&stmt.args))
            .await?)
    }

    async fn commit(&mut self) -> Result<(), SqlDepotError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlDepotError> {
        let result = self.finish("ROLLBACK").await;
        self.needs_rollback = false;
        result
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if self.needs_rollback
            && let Some(conn) = self.conn.take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            handle.spawn(async move {
                if let Err(err) = conn.simple_query("ROLLBACK").await {
                    tracing::warn!("postgres rollback on drop failed: {}", err);
                }
            });
        }
    }
}
