//! Execution context identifiers.
//!
//! A unit of work belongs to exactly one execution context. The context of
//! a caller is, in order:
//! - the enclosing [`with_work_context`] scope, a Tokio task-local that
//!   follows the future across worker threads;
//! - the running Tokio task, for spawned tasks with no scope;
//! - the OS thread, for synchronous callers and the future driven by
//!   `block_on`.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static WORK_CONTEXT: ContextId;
}

thread_local! {
    static THREAD_CONTEXT: ContextId = ContextId::next();
}

/// Opaque, process-unique identifier of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Repr);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Repr {
    Allocated(u64),
    Task(task::Id),
}

impl ContextId {
    /// Allocate a fresh context id.
    pub fn next() -> Self {
        Self(Repr::Allocated(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)))
    }

    /// The context of the caller: the enclosing scope, else the running
    /// task, else the thread.
    pub fn current() -> Self {
        WORK_CONTEXT.try_with(|id| *id).unwrap_or_else(|_| {
            task::try_id()
                .map(|id| Self(Repr::Task(id)))
                .unwrap_or_else(|| THREAD_CONTEXT.with(|id| *id))
        })
    }

    /// Check if the caller runs inside a [`with_work_context`] scope.
    pub fn is_scoped() -> bool {
        WORK_CONTEXT.try_with(|_| ()).is_ok()
    }

    /// Check if this context is a spawned Tokio task.
    pub fn is_task(&self) -> bool {
        matches!(self.0, Repr::Task(_))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Allocated(id) => write!(f, "ctx-{}", id),
            Repr::Task(id) => write!(f, "task-{}", id),
        }
    }
}

/// Run a future in a fresh execution context.
pub async fn with_work_context<F: Future>(f: F) -> F::Output {
    WORK_CONTEXT.scope(ContextId::next(), f).await
}

/// Run a future in the given execution context.
pub async fn in_work_context<F: Future>(context: ContextId, f: F) -> F::Output {
    WORK_CONTEXT.scope(context, f).await
}

/// Run a closure in a fresh execution context.
pub fn sync_work_context<R>(f: impl FnOnce() -> R) -> R {
    WORK_CONTEXT.sync_scope(ContextId::next(), f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_context_is_stable() {
        assert_eq!(ContextId::current(), ContextId::current());
        assert!(!ContextId::is_scoped());

        let here = ContextId::current();
        let there = std::thread::spawn(ContextId::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_sync_scope() {
        let outer = ContextId::current();
        let inner = sync_work_context(|| {
            assert!(ContextId::is_scoped());
            ContextId::current()
        });
        assert_ne!(outer, inner);
        assert_eq!(outer, ContextId::current());
    }

    #[tokio::test]
    async fn test_scoped_context() {
        let a = with_work_context(async { ContextId::current() }).await;
        let b = with_work_context(async { ContextId::current() }).await;
        assert_ne!(a, b);

        let pinned = ContextId::next();
        let seen = in_work_context(pinned, async {
            tokio::task::yield_now().await;
            ContextId::current()
        })
        .await;
        assert_eq!(seen, pinned);
    }

    #[tokio::test]
    async fn test_spawned_tasks_are_distinct_contexts() {
        let main = ContextId::current();
        assert!(!main.is_task());

        let a = tokio::spawn(async { ContextId::current() }).await.unwrap();
        let b = tokio::spawn(async { ContextId::current() }).await.unwrap();
        assert!(a.is_task());
        assert_ne!(a, b);
        assert_ne!(a, main);

        // a scope inside a task wins over the task id
        let scoped = tokio::spawn(with_work_context(async { ContextId::current() }))
            .await
            .unwrap();
        assert!(!scoped.is_task());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_task_context_survives_yields() {
        let (before, after) = tokio::spawn(async {
            let before = ContextId::current();
            for _ in 0..16 {
                tokio::task::yield_now().await;
            }
            (before, ContextId::current())
        })
        .await
        .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_display() {
        let id = ContextId::next();
        assert!(id.to_string().starts_with("ctx-"));
    }
}
