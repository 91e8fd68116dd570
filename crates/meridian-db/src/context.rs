//! # Request Context
//!
//! Cancellation and deadline carried into every repository call.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  handler ──► RequestContext { token, deadline }                        │
//! │                   │                                                     │
//! │                   ├── ensure_live()  before the first statement        │
//! │                   │        (dead → ContextCancelled / ContextTimeout,  │
//! │                   │         nothing written)                            │
//! │                   │                                                     │
//! │                   ├── run(fut)       races each statement against      │
//! │                   │                  cancellation and the deadline     │
//! │                   │                  (yields the open transaction)     │
//! │                   │                                                     │
//! │                   └── commit(tx)     ensure_live(), then COMMIT        │
//! │                            (dead → tx dropped, i.e. rolled back;       │
//! │                             the COMMIT itself is never raced)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::time::Duration;

use sqlx::{Sqlite, Transaction};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{DbError, DbResult};

/// Per-call cancellation token plus optional deadline.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that never cancels on its own.
    pub fn background() -> Self {
        RequestContext::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        RequestContext {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A context tied to an existing token (e.g. a server shutdown token).
    pub fn from_token(token: CancellationToken) -> Self {
        RequestContext {
            token,
            deadline: None,
        }
    }

    /// Child context: cancelled when `self` is, with the tighter deadline.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        RequestContext {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails if the context is cancelled or past its deadline.
    pub fn ensure_live(&self) -> DbResult<()> {
        if self.token.is_cancelled() {
            return Err(DbError::ContextCancelled);
        }
        if matches!(self.deadline, Some(d) if Instant::now() >= d) {
            return Err(DbError::ContextTimeout);
        }
        Ok(())
    }

    /// Runs `fut` unless the context dies first.
    ///
    /// A losing future is dropped mid-flight; callers only use this inside
    /// a transaction or for reads, so nothing half-written survives. Writes
    /// hand their transaction back out and finish with [`Self::commit`].
    pub async fn run<T, F>(&self, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        self.ensure_live()?;
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(DbError::ContextCancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(DbError::ContextTimeout),
                    res = fut => res,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(DbError::ContextCancelled),
                    res = fut => res,
                }
            }
        }
    }

    /// Commits `tx` if the context is still live.
    ///
    /// Once COMMIT is sent its outcome is reported as-is: a caller never
    /// sees `ContextCancelled` for a write that landed.
    pub async fn commit(&self, tx: Transaction<'_, Sqlite>) -> DbResult<()> {
        self.ensure_live()?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_context_is_live() {
        let ctx = RequestContext::background();
        assert!(ctx.ensure_live().is_ok());
        let value = ctx.run(async { Ok::<_, DbError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_fast() {
        let ctx = RequestContext::background();
        ctx.cancel();
        assert!(matches!(ctx.ensure_live(), Err(DbError::ContextCancelled)));
        let res = ctx.run(async { Ok::<_, DbError>(()) }).await;
        assert!(matches!(res, Err(DbError::ContextCancelled)));
    }

    #[tokio::test]
    async fn test_expired_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(0));
        assert!(matches!(ctx.ensure_live(), Err(DbError::ContextTimeout)));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_future() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(20));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, DbError>(())
            })
            .await;
        assert!(matches!(res, Err(DbError::ContextTimeout)));
    }

    async fn scratch_pool() -> sqlx::SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (v INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn rows(pool: &sqlx::SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_refuses_dead_context() {
        let pool = scratch_pool().await;
        let ctx = RequestContext::background();

        let mut tx = pool.begin().await.unwrap();
        sqlx::query("INSERT INTO t (v) VALUES (1)").execute(&mut *tx).await.unwrap();
        // dies after the writes, before COMMIT
        ctx.cancel();

        let res = ctx.commit(tx).await;
        assert!(matches!(res, Err(DbError::ContextCancelled)));
        assert_eq!(rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_commit_on_live_context_persists() {
        let pool = scratch_pool().await;
        let ctx = RequestContext::with_timeout(Duration::from_secs(30));

        let tx = ctx
            .run(async {
                let mut tx = pool.begin().await?;
                sqlx::query("INSERT INTO t (v) VALUES (1)").execute(&mut *tx).await?;
                Ok(tx)
            })
            .await
            .unwrap();
        ctx.commit(tx).await.unwrap();

        assert_eq!(rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_child_follows_parent_cancellation() {
        let parent = RequestContext::background();
        let child = parent.child(Some(Duration::from_secs(60)));
        assert!(child.deadline().is_some());
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
