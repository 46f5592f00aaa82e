use std::sync::Arc;

use crate::config::Options;
use crate::context::{Context, guard};
use crate::dialect::Dialect;
use crate::driver::Backend;
use crate::error::SqlDepotError;
use crate::session::Session;
use crate::types::DatabaseType;

#[cfg(feature = "postgres")]
use crate::postgres::config::{PostgresOptions, PostgresOptionsBuilder};
#[cfg(feature = "sqlite")]
use crate::sqlite::config::SqliteOptionsBuilder;

/// Entry point: a pooled backend plus the options applied to every session it hands out.
#[derive(Debug, Clone)]
pub struct Depot {
    backend: Arc<dyn Backend>,
    dialect: Arc<dyn Dialect>,
    log_sql: bool,
}

impl Depot {
    /// Wrap an already constructed backend. Without a dialect in `options` the backend's
    /// default dialect is used.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, options: Options) -> Self {
        let dialect = options
            .dialect
            .unwrap_or_else(|| backend.default_dialect());
        Self {
            backend,
            dialect,
            log_sql: options.log_sql,
        }
    }

    /// Open a pool for `db_type` from a connection string: a file path (or `:memory:`) for
    /// `SQLite`, a `postgres://` URL or key/value string for `PostgreSQL`.
    ///
    /// # Errors
    /// Returns `SqlDepotError::ConfigError` for an unparsable `dsn`, or the pool's connection
    /// error.
    pub async fn open(
        db_type: DatabaseType,
        dsn: &str,
        options: Options,
    ) -> Result<Self, SqlDepotError> {
        match db_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                PostgresOptions::from_url(dsn)?
                    .with_options(options)
                    .build()
                    .await
            }
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {
                SqliteOptionsBuilder::new(dsn)
                    .options(options)
                    .build()
                    .await
            }
            #[cfg(any(test, feature = "test-utils"))]
            DatabaseType::Recording => {
                let _ = dsn;
                let backend = crate::test_utils::RecordingBackend::new();
                Ok(Self::new(Arc::new(backend), options))
            }
        }
    }

    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn sqlite_builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    #[cfg(feature = "postgres")]
    #[must_use]
    pub fn postgres_builder(config: tokio_postgres::Config) -> PostgresOptionsBuilder {
        PostgresOptionsBuilder::new(config)
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.backend.database_type()
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Acquire the session for `ctx`.
    ///
    /// When `ctx` already carries a session it is joined: its depth grows by one and the same
    /// `Arc` is returned with `ctx` unchanged. Otherwise a connection is checked out, a
    /// transaction begun, and a context derived from `ctx` carrying the new session returned.
    ///
    /// # Errors
    /// * `SqlDepotError::TransactionClosed` when the carried session was already finalized.
    /// * Pool or `BEGIN` failures from the backend.
    /// * `Cancelled` / `DeadlineExceeded` from `ctx`.
    pub async fn begin(&self, ctx: &Context) -> Result<(Arc<Session>, Context), SqlDepotError> {
        if let Some(session) = ctx.session() {
            let depth = session.enter()?;
            tracing::debug!("joined session at depth {}", depth);
            return Ok((session, ctx.clone()));
        }

        let tx = guard(ctx.cancellation_token(), ctx.deadline(), self.backend.begin()).await?;
        let session = Arc::new(Session::new(
            tx,
            self.backend.database_type(),
            Arc::clone(&self.dialect),
            self.log_sql,
            ctx,
        ));
        tracing::debug!(
            "session started db={:?} dialect={}",
            session.database_type(),
            self.dialect.name()
        );
        let derived = ctx.with_session(Arc::clone(&session));
        Ok((session, derived))
    }

    /// Close the underlying pool. Open sessions keep their connections until they finish.
    pub async fn close(&self) {
        tracing::debug!("closing depot db={:?}", self.backend.database_type());
        self.backend.close().await;
    }
}
