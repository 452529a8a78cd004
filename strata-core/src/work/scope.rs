//! Scoped units of work with guaranteed cleanup.

use std::future::Future;

use super::context::{ContextId, with_work_context};
use super::manager::UnitOfWork;
use crate::error::StrataResult;

/// Run `f` as one unit of work in a fresh execution context.
///
/// Work begins before `f` is polled and always ends afterwards, also when
/// `f` fails, panics, or is cancelled. An error from `f` wins over an error
/// from ending the unit.
///
/// ```rust,ignore
/// let total = with_unit_of_work(&uow, async {
///     let handle = uow.get().await?;
///     let rows = handle.query("SELECT SUM(total) AS total FROM invoice").await?;
///     handle.commit().await?;
///     Ok(rows)
/// })
/// .await?;
/// ```
pub async fn with_unit_of_work<F, T>(uow: &UnitOfWork, f: F) -> StrataResult<T>
where
    F: Future<Output = StrataResult<T>>,
{
    with_work_context(async {
        let context = ContextId::current();
        uow.begin_in(context).await?;
        let guard = WorkUnitGuard::new(uow, context);

        let result = f.await;
        let ended = guard.end().await;

        let value = result?;
        ended?;
        Ok(value)
    })
    .await
}

/// Ends work on a context when dropped.
///
/// Dropping the guard releases the handle without waiting for its rollback;
/// [`end`](Self::end) waits and reports close errors.
#[must_use = "work ends as soon as the guard is dropped"]
pub struct WorkUnitGuard<'a> {
    uow: &'a UnitOfWork,
    context: ContextId,
    armed: bool,
}

impl<'a> WorkUnitGuard<'a> {
    pub(crate) fn new(uow: &'a UnitOfWork, context: ContextId) -> Self {
        Self {
            uow,
            context,
            armed: true,
        }
    }

    /// The guarded context.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// End work now and wait for the handle to close.
    pub async fn end(mut self) -> StrataResult<()> {
        self.armed = false;
        self.uow.end_in(self.context).await
    }
}

impl Drop for WorkUnitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.uow.release_in(self.context);
        }
    }
}
