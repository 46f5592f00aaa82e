use std::sync::Arc;

use crate::dialect::Dialect;

#[cfg(feature = "postgres")]
pub use crate::postgres::config::{PostgresOptions, PostgresOptionsBuilder};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::config::{SqliteOptions, SqliteOptionsBuilder};

/// Options shared by every backend.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Placeholder dialect; `None` uses the backend's default.
    pub dialect: Option<Arc<dyn Dialect>>,
    /// Log every rendered statement at `debug` instead of `trace`.
    pub log_sql: bool,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Some(Arc::new(dialect));
        self
    }

    #[must_use]
    pub fn with_log_sql(mut self, log_sql: bool) -> Self {
        self.log_sql = log_sql;
        self
    }
}
