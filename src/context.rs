//! Explicit ambient carrier for the current session, cancellation and deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SqlDepotError;
use crate::session::Session;

/// Request-scoped context passed to every session-acquiring call.
///
/// Cloning is cheap. A context derived by [`Depot::begin`](crate::Depot::begin) carries the
/// session; nested repository calls that receive it join the same transaction.
#[derive(Debug, Clone, Default)]
pub struct Context {
    session: Option<Arc<Session>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: no session, never cancelled, no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Child context whose token is cancelled with the parent's and by [`Context::cancel`].
    #[must_use]
    pub fn with_cancellation(&self) -> Self {
        Self {
            session: self.session.clone(),
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context with `deadline`, or the parent's if that is earlier.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            session: self.session.clone(),
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The session stored in this context, if any.
    #[must_use]
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.clone()
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// The session stored in this context.
    ///
    /// # Panics
    /// Panics when no session was acquired for this context. Reaching a session-dependent
    /// operation without one is a caller defect.
    #[must_use]
    pub fn must_session(&self) -> Arc<Session> {
        match &self.session {
            Some(session) => Arc::clone(session),
            None => panic!("no session in context"),
        }
    }

    pub(crate) fn with_session(&self, session: Arc<Session>) -> Self {
        Self {
            session: Some(session),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }
}

/// Fail if `cancel` already fired or `deadline` already passed.
pub(crate) fn check(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<(), SqlDepotError> {
    if cancel.is_cancelled() {
        return Err(SqlDepotError::Cancelled);
    }
    if deadline.is_some_and(|at| at <= Instant::now()) {
        return Err(SqlDepotError::DeadlineExceeded);
    }
    Ok(())
}

/// Race `fut` against `cancel` and `deadline`. Cancellation wins ties.
///
/// Losing the race drops `fut`; work it already handed to a blocking thread may still
/// complete. Never use this for `COMMIT`, whose outcome must be reported as it happened.
pub(crate) async fn guard<T>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    fut: impl Future<Output = Result<T, SqlDepotError>>,
) -> Result<T, SqlDepotError> {
    check(cancel, deadline)?;
    let expired = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SqlDepotError::Cancelled),
        () = expired => Err(SqlDepotError::DeadlineExceeded),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_has_no_session() {
        let ctx = Context::background();
        assert!(!ctx.has_session());
        assert!(ctx.session().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    #[should_panic(expected = "no session in context")]
    fn must_session_panics_without_session() {
        let _ = Context::background().must_session();
    }

    #[test]
    fn parent_cancellation_reaches_children() {
        let parent = Context::background();
        let child = parent.with_cancellation();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn child_cancellation_stays_local() {
        let parent = Context::background();
        let child = parent.with_cancellation();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn guard_reports_expired_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        let err = guard(ctx.cancellation_token(), ctx.deadline(), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlDepotError::DeadlineExceeded));
    }

    #[test]
    fn check_reports_cancellation_before_deadline() {
        let ctx = Context::background()
            .with_deadline(Instant::now())
            .with_cancellation();
        assert!(matches!(
            check(ctx.cancellation_token(), ctx.deadline()),
            Err(SqlDepotError::DeadlineExceeded)
        ));
        ctx.cancel();
        assert!(matches!(
            check(ctx.cancellation_token(), ctx.deadline()),
            Err(SqlDepotError::Cancelled)
        ));
        let open = Context::background().with_timeout(Duration::from_secs(60));
        assert!(check(open.cancellation_token(), open.deadline()).is_ok());
    }

    #[tokio::test]
    async fn earlier_deadline_wins() {
        let short = Context::background().with_timeout(Duration::from_millis(10));
        let longer = short.with_timeout(Duration::from_secs(60));
        assert_eq!(short.deadline(), longer.deadline());
    }
}
