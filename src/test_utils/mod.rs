//! Scripted in-memory backend for exercising sessions without a database.
//!
//! [`RecordingBackend`] records every statement and counts physical begins, commits and
//! rollbacks. Rows returned by queries are scripted through its [`RecordingHandle`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::dialect::{DefaultDialect, Dialect, Statement};
use crate::driver::{Backend, DriverTransaction};
use crate::error::SqlDepotError;
use crate::row::materialize;
use crate::types::{DatabaseType, Value};
use crate::values::Values;

#[derive(Debug, Default)]
struct Log {
    begins: usize,
    commits: usize,
    rollbacks: usize,
    executed: Vec<Statement>,
    scripted_rows: VecDeque<Vec<Vec<Value>>>,
    fail_next: Option<String>,
    fail_commit: Option<String>,
}

/// Shared view of what a [`RecordingBackend`] did, and the script for what it returns.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandle {
    log: Arc<Mutex<Log>>,
}

impl RecordingHandle {
    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn begins(&self) -> usize {
        self.log().begins
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.log().commits
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.log().rollbacks
    }

    /// SQL text of every statement run so far.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.log().executed.iter().map(|s| s.sql.clone()).collect()
    }

    /// Every statement run so far, with arguments.
    #[must_use]
    pub fn executed(&self) -> Vec<Statement> {
        self.log().executed.clone()
    }

    /// Rows returned by the next query. Unscripted queries return no rows.
    pub fn push_rows(&self, rows: Vec<Vec<Value>>) {
        self.log().scripted_rows.push_back(rows);
    }

    /// Make the next statement fail with `SqlDepotError::ExecutionError(message)`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.log().fail_next = Some(message.into());
    }

    /// Make the next physical commit fail.
    pub fn fail_commit(&self, message: impl Into<String>) {
        self.log().fail_commit = Some(message.into());
    }

    fn record(&self, stmt: &Statement) -> Result<(), SqlDepotError> {
        let mut log = self.log();
        log.executed.push(stmt.clone());
        match log.fail_next.take() {
            Some(message) => Err(SqlDepotError::ExecutionError(message)),
            None => Ok(()),
        }
    }

    fn next_rows(&self) -> Vec<Vec<Value>> {
        self.log().scripted_rows.pop_front().unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct RecordingBackend {
    handle: RecordingHandle,
    dialect: Arc<dyn Dialect>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: RecordingHandle::default(),
            dialect: Arc::new(DefaultDialect),
        }
    }

    /// Report `dialect` as this backend's default.
    #[must_use]
    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Arc::new(dialect);
        self
    }

    #[must_use]
    pub fn handle(&self) -> RecordingHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Recording
    }

    fn default_dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    async fn begin(&self) -> Result<Box<dyn DriverTransaction>, SqlDepotError> {
        self.handle.log().begins += 1;
        Ok(Box::new(RecordingTransaction {
            handle: self.handle.clone(),
        }))
    }
}

struct RecordingTransaction {
    handle: RecordingHandle,
}

#[async_trait]
impl DriverTransaction for RecordingTransaction {
    async fn fetch_optional(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Option<Values>, SqlDepotError> {
        self.handle.record(stmt)?;
        self.handle
            .next_rows()
            .first()
            .map(|row| materialize(names, row.as_slice()))
            .transpose()
    }

    async fn fetch_all(
        &mut self,
        stmt: &Statement,
        names: &[String],
    ) -> Result<Vec<Values>, SqlDepotError> {
        self.handle.record(stmt)?;
        self.handle
            .next_rows()
            .iter()
            .map(|row| materialize(names, row.as_slice()))
            .collect()
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, SqlDepotError> {
        self.handle.record(stmt)?;
        Ok(1)
    }

    async fn commit(&mut self) -> Result<(), SqlDepotError> {
        let mut log = self.handle.log();
        if let Some(message) = log.fail_commit.take() {
            return Err(SqlDepotError::ExecutionError(message));
        }
        log.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlDepotError> {
        self.handle.log().rollbacks += 1;
        Ok(())
    }
}
