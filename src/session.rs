//! Transaction-scoped sessions.
//!
//! A [`Session`] owns exactly one physical transaction. Nested acquisitions through the same
//! [`Context`] share it and only bump a depth counter, so only the outermost
//! [`Session::commit`] reaches the driver. Any recorded error, including the marker left by a
//! nested [`Session::rollback`], makes every later commit fail.
//!
//! ```rust,no_run
//! use sql_depot::prelude::*;
//! use sql_depot::query::{cols, eq, table};
//!
//! # async fn demo(depot: &Depot) -> Result<(), SqlDepotError> {
//! let (session, ctx) = depot.begin(&Context::background()).await?;
//! let row = session
//!     .query_one(&cols(["id", "text"]), &table("messages"), &[eq("id", "1").into()])
//!     .await;
//! match row {
//!     Ok(values) => println!("{:?}", values.get_string("text")),
//!     Err(e) if e.is_no_result() => println!("not found"),
//!     Err(e) => {
//!         session.rollback().await?;
//!         return Err(e);
//!     }
//! }
//! # let _ = ctx;
//! session.commit().await
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::{Context, check, guard};
use crate::dialect::{Dialect, Statement};
use crate::driver::DriverTransaction;
use crate::error::SqlDepotError;
use crate::query::{Clause, ColsClause, TableClause};
use crate::render;
use crate::types::{DatabaseType, Value};
use crate::values::Values;

const COUNT_COLUMN: &str = "count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Committed,
    RolledBack,
}

struct ControlState {
    depth: usize,
    error: Option<Arc<SqlDepotError>>,
    status: SessionStatus,
}

type TxSlot = Option<Box<dyn DriverTransaction>>;

pub struct Session {
    database_type: DatabaseType,
    dialect: Arc<dyn Dialect>,
    log_sql: bool,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    control: Mutex<ControlState>,
    tx: tokio::sync::Mutex<TxSlot>,
}

impl Session {
    pub(crate) fn new(
        tx: Box<dyn DriverTransaction>,
        database_type: DatabaseType,
        dialect: Arc<dyn Dialect>,
        log_sql: bool,
        ctx: &Context,
    ) -> Self {
        Self {
            database_type,
            dialect,
            log_sql,
            cancel: ctx.cancellation_token().clone(),
            deadline: ctx.deadline(),
            control: Mutex::new(ControlState {
                depth: 1,
                error: None,
                status: SessionStatus::Active,
            }),
            tx: tokio::sync::Mutex::new(Some(tx)),
        }
    }

    /// Join this session from a nested unit of work.
    pub(crate) fn enter(&self) -> Result<usize, SqlDepotError> {
        let mut control = self.control();
        if control.status != SessionStatus::Active {
            return Err(SqlDepotError::TransactionClosed);
        }
        control.depth += 1;
        Ok(control.depth)
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Number of logical units currently sharing the transaction; 0 once finalized.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.control().depth
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.control().status
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.control().error.is_some()
    }

    /// Record (`Some`) or clear (`None`) the sticky error. The driver is not touched.
    pub fn set_error(&self, err: Option<SqlDepotError>) {
        let mut control = self.control();
        match err {
            Some(err) => {
                tracing::debug!("session poisoned: {}", err);
                control.error = Some(Arc::new(err));
            }
            None => control.error = None,
        }
    }

    /// The recorded sticky error, if any.
    #[must_use]
    pub fn error(&self) -> Option<Arc<SqlDepotError>> {
        self.control().error.clone()
    }

    /// Finish one logical unit of work.
    ///
    /// Only the outermost commit reaches the driver. Cancellation and the deadline are checked
    /// before `COMMIT` is issued; once issued, its real outcome is awaited and reported. If the
    /// physical commit fails the transaction is rolled back and the session ends rolled back.
    ///
    /// # Errors
    /// * `SqlDepotError::Poisoned` when an error was recorded, at any depth.
    /// * `SqlDepotError::TransactionClosed` when the session was already finalized.
    /// * `Cancelled` / `DeadlineExceeded` before `COMMIT` was issued; the session stays active
    ///   and must still be rolled back.
    /// * The driver's commit error.
    pub async fn commit(&self) -> Result<(), SqlDepotError> {
        {
            let mut control = self.control();
            if control.status != SessionStatus::Active {
                return Err(SqlDepotError::TransactionClosed);
            }
            if let Some(err) = &control.error {
                tracing::debug!("commit refused on poisoned session: {}", err);
                return Err(SqlDepotError::Poisoned(Arc::clone(err)));
            }
            if control.depth > 1 {
                control.depth -= 1;
                tracing::debug!("nested commit, depth now {}", control.depth);
                return Ok(());
            }
        }

        let mut slot = self.tx.lock().await;
        check(&self.cancel, self.deadline)?;
        let Some(mut tx) = slot.take() else {
            return Err(SqlDepotError::TransactionClosed);
        };
        match tx.commit().await {
            Ok(()) => {
                self.finish(SessionStatus::Committed);
                tracing::debug!("session committed");
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("rollback after failed commit failed: {}", rollback_err);
                }
                self.finish(SessionStatus::RolledBack);
                tracing::debug!("commit failed, session rolled back: {}", err);
                Err(err)
            }
        }
    }

    /// Abandon one logical unit of work.
    ///
    /// Safe to call unconditionally as cleanup: on a finalized session it does nothing. A
    /// nested rollback only records `RolledBack` so the enclosing commit fails. The physical
    /// rollback runs even when the context was cancelled, so a cancelled unit of work still
    /// releases its connection cleanly.
    ///
    /// # Errors
    /// Returns the driver's rollback error. The session is finalized either way.
    pub async fn rollback(&self) -> Result<(), SqlDepotError> {
        {
            let mut control = self.control();
            if control.status != SessionStatus::Active {
                return Ok(());
            }
            if control.depth > 1 {
                control.depth -= 1;
                if control.error.is_none() {
                    control.error = Some(Arc::new(SqlDepotError::RolledBack));
                }
                tracing::debug!("nested rollback, session poisoned at depth {}", control.depth);
                return Ok(());
            }
        }

        let mut slot = self.tx.lock().await;
        let Some(mut tx) = slot.take() else {
            return Ok(());
        };
        self.finish(SessionStatus::RolledBack);
        tracing::debug!("session rolled back");
        tx.rollback().await
    }

    /// Select at most one row.
    ///
    /// # Errors
    /// `SqlDepotError::NoResult` when nothing matches; other failures are wrapped in
    /// `SqlDepotError::Statement`.
    pub async fn query_one(
        &self,
        cols: &ColsClause,
        table: &TableClause,
        clauses: &[Clause],
    ) -> Result<Values, SqlDepotError> {
        let stmt = render::select(self.dialect(), cols, table, clauses);
        self.log_statement("query_one", &stmt);
        let mut slot = self.tx.lock().await;
        let tx = active(&mut slot)?;
        match self.guarded(tx.fetch_optional(&stmt, cols.names())).await {
            Ok(Some(values)) => Ok(values),
            Ok(None) => Err(SqlDepotError::NoResult),
            Err(err) => Err(SqlDepotError::statement(&stmt.sql, err)),
        }
    }

    /// Select every matching row in cursor order; an empty vector when nothing matches.
    ///
    /// # Errors
    /// Driver failures wrapped in `SqlDepotError::Statement`.
    pub async fn query_many(
        &self,
        cols: &ColsClause,
        table: &TableClause,
        clauses: &[Clause],
    ) -> Result<Vec<Values>, SqlDepotError> {
        let stmt = render::select(self.dialect(), cols, table, clauses);
        self.log_statement("query_many", &stmt);
        let mut slot = self.tx.lock().await;
        let tx = active(&mut slot)?;
        self.guarded(tx.fetch_all(&stmt, cols.names()))
            .await
            .map_err(|err| SqlDepotError::statement(&stmt.sql, err))
    }

    /// `select count(*)` over the matching rows.
    ///
    /// # Errors
    /// Driver failures wrapped in `SqlDepotError::Statement`.
    pub async fn query_count(
        &self,
        table: &TableClause,
        clauses: &[Clause],
    ) -> Result<i64, SqlDepotError> {
        let stmt = render::count(self.dialect(), table, clauses);
        self.log_statement("query_count", &stmt);
        let names = [COUNT_COLUMN.to_string()];
        let mut slot = self.tx.lock().await;
        let tx = active(&mut slot)?;
        let row = self
            .guarded(tx.fetch_optional(&stmt, &names))
            .await
            .map_err(|err| SqlDepotError::statement(&stmt.sql, err))?;
        row.as_ref()
            .and_then(|values| values.get_i64(COUNT_COLUMN))
            .ok_or_else(|| {
                SqlDepotError::statement(
                    &stmt.sql,
                    SqlDepotError::Mapping("count query returned no integer".into()),
                )
            })
    }

    /// Insert one row built from every entry of `values`. Returns the affected row count.
    ///
    /// # Errors
    /// `SqlDepotError::ParameterError` for an empty container; driver failures wrapped in
    /// `SqlDepotError::Statement`.
    pub async fn insert_one(
        &self,
        table: &TableClause,
        values: &Values,
    ) -> Result<u64, SqlDepotError> {
        let stmt = render::insert(self.dialect(), table, values)?;
        self.execute_statement("insert_one", &stmt).await
    }

    /// Set every entry of `values` on all matching rows. Returns the affected row count.
    ///
    /// # Errors
    /// `SqlDepotError::ParameterError` for an empty container; driver failures wrapped in
    /// `SqlDepotError::Statement`.
    pub async fn update_many(
        &self,
        table: &TableClause,
        values: &Values,
        clauses: &[Clause],
    ) -> Result<u64, SqlDepotError> {
        let stmt = render::update(self.dialect(), table, values, clauses)?;
        self.execute_statement("update_many", &stmt).await
    }

    /// Delete all matching rows; with no where clauses the whole table is emptied.
    ///
    /// # Errors
    /// Driver failures wrapped in `SqlDepotError::Statement`.
    pub async fn delete_many(
        &self,
        table: &TableClause,
        clauses: &[Clause],
    ) -> Result<u64, SqlDepotError> {
        let stmt = render::delete(self.dialect(), table, clauses);
        self.execute_statement("delete_many", &stmt).await
    }

    /// Run raw SQL inside the session's transaction. `sql` must already use this session's
    /// placeholder syntax.
    ///
    /// # Errors
    /// Driver failures wrapped in `SqlDepotError::Statement`.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<u64, SqlDepotError> {
        let stmt = Statement::new(sql, args.to_vec());
        self.execute_statement("exec", &stmt).await
    }

    async fn execute_statement(&self, op: &str, stmt: &Statement) -> Result<u64, SqlDepotError> {
        self.log_statement(op, stmt);
        let mut slot = self.tx.lock().await;
        let tx = active(&mut slot)?;
        self.guarded(tx.execute(stmt))
            .await
            .map_err(|err| SqlDepotError::statement(&stmt.sql, err))
    }

    /// Race a driver call against the acquiring context's cancellation and deadline.
    async fn guarded<T>(
        &self,
        fut: impl Future<Output = Result<T, SqlDepotError>>,
    ) -> Result<T, SqlDepotError> {
        guard(&self.cancel, self.deadline, fut).await
    }

    fn finish(&self, status: SessionStatus) {
        let mut control = self.control();
        control.status = status;
        control.depth = 0;
    }

    fn control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_statement(&self, op: &str, stmt: &Statement) {
        if self.log_sql {
            tracing::debug!("{}: '{}' args={}", op, stmt.sql, stmt.args.len());
        } else {
            tracing::trace!("{}: '{}' args={}", op, stmt.sql, stmt.args.len());
        }
    }
}

fn active(slot: &mut TxSlot) -> Result<&mut (dyn DriverTransaction + 'static), SqlDepotError> {
    slot.as_deref_mut().ok_or(SqlDepotError::TransactionClosed)
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.control();
        f.debug_struct("Session")
            .field("database_type", &self.database_type)
            .field("dialect", &self.dialect.name())
            .field("depth", &control.depth)
            .field("status", &control.status)
            .field("poisoned", &control.error.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(mut tx) = self.tx.get_mut().take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = tx.rollback().await {
                    tracing::warn!("rollback of dropped session failed: {}", err);
                }
            });
        } else {
            tracing::warn!("session dropped outside a runtime; leaving rollback to the driver");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::depot::Depot;
    use crate::query::{cols, desc, eq, in_list, table};
    use crate::test_utils::{RecordingBackend, RecordingHandle};

    fn depot() -> (Depot, RecordingHandle) {
        let backend = RecordingBackend::new();
        let handle = backend.handle();
        (Depot::new(Arc::new(backend), Options::default()), handle)
    }

    #[tokio::test]
    async fn outer_commit_is_the_only_physical_commit() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, rec) = depot();
        let (outer, ctx) = depot.begin(&Context::background()).await?;
        let (inner, inner_ctx) = depot.begin(&ctx).await?;
        assert!(Arc::ptr_eq(&outer, &inner));
        assert!(Arc::ptr_eq(&inner_ctx.must_session(), &outer));
        assert_eq!(outer.depth(), 2);

        inner.commit().await?;
        assert_eq!(rec.commits(), 0);
        outer.commit().await?;
        assert_eq!(rec.commits(), 1);
        assert_eq!(rec.begins(), 1);
        assert_eq!(outer.status(), SessionStatus::Committed);
        Ok(())
    }

    #[tokio::test]
    async fn inner_rollback_poisons_outer_commit() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, rec) = depot();
        let (outer, ctx) = depot.begin(&Context::background()).await?;
        let (inner, _) = depot.begin(&ctx).await?;

        inner.rollback().await?;
        assert_eq!(rec.rollbacks(), 0);
        assert!(outer.is_poisoned());

        let err = outer.commit().await.unwrap_err();
        assert!(err.is_poisoned());
        assert!(err.is_rolled_back());
        assert_eq!(rec.commits(), 0);

        outer.rollback().await?;
        assert_eq!(rec.rollbacks(), 1);
        assert_eq!(outer.status(), SessionStatus::RolledBack);
        Ok(())
    }

    #[tokio::test]
    async fn rollback_twice_is_a_noop() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, rec) = depot();
        let (session, _) = depot.begin(&Context::background()).await?;
        session.rollback().await?;
        session.rollback().await?;
        assert_eq!(rec.rollbacks(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn recorded_error_blocks_commit_until_cleared() -> Result<(), Box<dyn std::error::Error>>
    {
        let (depot, rec) = depot();
        let (session, _) = depot.begin(&Context::background()).await?;
        session.set_error(Some(SqlDepotError::Other("repository failed".into())));
        let err = session.commit().await.unwrap_err();
        assert!(err.is_poisoned());
        assert!(!err.is_rolled_back());
        assert_eq!(rec.commits(), 0);

        session.set_error(None);
        session.commit().await?;
        assert_eq!(rec.commits(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn finalized_session_rejects_work() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, _rec) = depot();
        let (session, ctx) = depot.begin(&Context::background()).await?;
        session.commit().await?;

        let err = session.commit().await.unwrap_err();
        assert!(matches!(err, SqlDepotError::TransactionClosed));
        let err = session
            .delete_many(&table("messages"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SqlDepotError::TransactionClosed));
        assert!(matches!(
            depot.begin(&ctx).await.unwrap_err(),
            SqlDepotError::TransactionClosed
        ));
        session.rollback().await?;
        Ok(())
    }

    #[tokio::test]
    async fn statements_reach_the_driver_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, rec) = depot();
        let (session, _) = depot.begin(&Context::background()).await?;
        session
            .insert_one(&table("messages"), &Values::new().with("id", "3"))
            .await?;
        session
            .delete_many(&table("messages"), &[in_list("id", ["2", "3"]).into()])
            .await?;
        session
            .query_many(&cols(["id"]), &table("messages"), &[desc("id").into()])
            .await?;
        assert_eq!(
            rec.statements(),
            vec![
                "insert into messages (id) values (?)".to_string(),
                "delete from messages where (id in (?, ?))".to_string(),
                "select id from messages order by id desc".to_string(),
            ]
        );
        session.commit().await?;
        Ok(())
    }

    #[tokio::test]
    async fn empty_result_is_no_result() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, _rec) = depot();
        let (session, _) = depot.begin(&Context::background()).await?;
        let err = session
            .query_one(&cols(["id"]), &table("messages"), &[eq("id", "9").into()])
            .await
            .unwrap_err();
        assert!(err.is_no_result());
        assert!(matches!(err, SqlDepotError::NoResult));

        let rows = session
            .query_many(&cols(["id"]), &table("messages"), &[])
            .await?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn driver_failures_carry_the_sql() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, rec) = depot();
        rec.fail_next("disk I/O error");
        let (session, _) = depot.begin(&Context::background()).await?;
        let err = session
            .update_many(
                &table("messages"),
                &Values::new().with("text", "x"),
                &[eq("id", "1").into()],
            )
            .await
            .unwrap_err();
        match err {
            SqlDepotError::Statement { sql, .. } => {
                assert_eq!(sql, "update messages set text = ? where (id = ?)");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!session.is_poisoned());
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_context_aborts_statements() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, rec) = depot();
        let ctx = Context::background().with_cancellation();
        let (session, _) = depot.begin(&ctx).await?;
        ctx.cancel();
        let err = session
            .query_count(&table("messages"), &[])
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(matches!(err, SqlDepotError::Statement { .. }));
        session.rollback().await.ok();
        assert_eq!(session.status(), SessionStatus::RolledBack);
        assert_eq!(rec.commits(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_commit_is_refused_before_the_driver() -> Result<(), Box<dyn std::error::Error>>
    {
        let (depot, rec) = depot();
        let ctx = Context::background().with_cancellation();
        let (session, _) = depot.begin(&ctx).await?;
        session
            .insert_one(&table("messages"), &Values::new().with("id", "1"))
            .await?;
        ctx.cancel();

        let err = session.commit().await.unwrap_err();
        assert!(matches!(err, SqlDepotError::Cancelled));
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(rec.commits(), 0);

        // Cleanup still reaches the driver under the cancelled context.
        session.rollback().await?;
        assert_eq!(session.status(), SessionStatus::RolledBack);
        assert_eq!(rec.rollbacks(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn dropped_active_session_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
        let (depot, rec) = depot();
        {
            let (_session, _ctx) = depot.begin(&Context::background()).await?;
        }
        for _ in 0..50 {
            if rec.rollbacks() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(rec.rollbacks(), 1);
        Ok(())
    }
}
