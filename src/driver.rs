//! The narrow seam between sessions and concrete drivers.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dialect::{Dialect, Statement};
use crate::error::SqlDepotError;
use crate::types::DatabaseType;
use crate::values::Values;

/// A pooled source of physical transactions.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    fn database_type(&self) -> DatabaseType;

    /// Dialect used when the depot options do not override it.
    fn default_dialect(&self) -> Arc<dyn Dialect>;

    /// Check out a connection and issue `BEGIN` on it.
    async fn begin(&self) -> Result<Box<dyn DriverTransaction>, SqlDepotError>;

    /// Release pooled resources. Later calls to `begin` may fail.
    async fn close(&self) {}
}

/// One open physical transaction on one checked-out connection.
///
/// `commit` and `rollback` finalize the transaction; the connection goes back to the pool
/// when the value is dropped.
#[async_trait]
pub trait DriverTransaction: Send {
    /// Run a query and materialize the first row, if any, against `names`.
    async fn fetch_optional(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Option<Values>, SqlDepotError>;

    /// Run a query and materialize every row in cursor order.
    async fn fetch_all(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Vec<Values>, SqlDepotError>;

    /// Run a statement and return the affected row count.
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, SqlDepotError>;

    async fn commit(&mut self) -> Result<(), SqlDepotError>;

    async fn rollback(&mut self) -> Result<(), SqlDepotError>;
}
