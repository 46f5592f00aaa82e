// SQLite backend
//
// - config: options, builder and the bb8 connection manager
// - params: conversion of `Value` parameters to rusqlite values
// - query: row capture and statement execution on a locked connection
// - backend: the `Backend` / `DriverTransaction` implementations

mod backend;
pub mod config;
pub mod params;
pub mod query;

pub use backend::SqliteBackend;
pub use config::{SharedSqliteConnection, SqliteManager, SqliteOptions, SqliteOptionsBuilder};

use tokio::task::spawn_blocking;

use crate::error::SqlDepotError;

/// Run `func` against the locked connection on the blocking pool.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlDepotError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlDepotError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlDepotError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
