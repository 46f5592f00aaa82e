use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlDepotError {
    /// A query expected to match a row matched nothing.
    #[error("no result")]
    NoResult,

    /// Recorded on a session when a nested unit of work rolled back.
    #[error("rolled back")]
    RolledBack,

    /// Commit refused because an error was recorded on the session earlier.
    #[error("transaction poisoned: {0}")]
    Poisoned(#[source] Arc<SqlDepotError>),

    #[error("failed to execute '{sql}': {source}")]
    Statement {
        sql: String,
        #[source]
        source: Box<SqlDepotError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("transaction already completed")]
    TransactionClosed,

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlDepotError {
    /// Wrap a driver failure with the statement text that caused it.
    pub(crate) fn statement(sql: &str, source: SqlDepotError) -> Self {
        SqlDepotError::Statement {
            sql: sql.to_string(),
            source: Box::new(source),
        }
    }

    /// True for the not-found signal of single-row queries.
    #[must_use]
    pub fn is_no_result(&self) -> bool {
        match self {
            SqlDepotError::NoResult => true,
            SqlDepotError::Statement { source, .. } => source.is_no_result(),
            _ => false,
        }
    }

    /// True when this error is, or was caused by, a nested rollback.
    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        match self {
            SqlDepotError::RolledBack => true,
            SqlDepotError::Poisoned(inner) => inner.is_rolled_back(),
            _ => false,
        }
    }

    /// True when a commit was refused because of a recorded error.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        matches!(self, SqlDepotError::Poisoned(_))
    }

    /// True when the operation was aborted by the context's cancellation or deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            SqlDepotError::Cancelled | SqlDepotError::DeadlineExceeded => true,
            SqlDepotError::Statement { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
