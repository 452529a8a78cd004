//! Ambient tenant binding for a request.
//!
//! Async code binds a tenant with [`with_tenant`], which scopes a Tokio
//! task-local for the duration of the future. Synchronous code binds one to
//! the current thread with [`set_sync_tenant`]. A unit of work that begins
//! inside either scope routes to that tenant.
//!
//! ```rust,ignore
//! use strata_core::tenant::with_tenant;
//!
//! with_tenant("acme", async {
//!     let handle = service.get().await?;
//!     handle.execute("UPDATE invoice SET paid = 1 WHERE id = 7").await?;
//!     handle.commit().await
//! }).await?;
//! ```

use std::cell::RefCell;
use std::future::Future;

use super::context::TenantId;

tokio::task_local! {
    static TENANT_ID: TenantId;
}

thread_local! {
    static SYNC_TENANT_ID: RefCell<Option<TenantId>> = const { RefCell::new(None) };
}

/// Execute an async block with the given tenant bound.
pub async fn with_tenant<F, T>(tenant_id: impl Into<TenantId>, f: F) -> T
where
    F: Future<Output = T>,
{
    TENANT_ID.scope(tenant_id.into(), f).await
}

/// Get the tenant bound to the current task, falling back to the thread.
#[inline]
pub fn current_tenant_id() -> Option<TenantId> {
    TENANT_ID
        .try_with(|id| id.clone())
        .ok()
        .or_else(sync_tenant_id)
}

/// Check if a tenant is bound to the current task or thread.
#[inline]
pub fn has_tenant() -> bool {
    current_tenant_id().is_some()
}

/// Bind a tenant to the current thread until the guard is dropped.
///
/// Guards nest: dropping one restores the previously bound tenant.
pub fn set_sync_tenant(tenant_id: impl Into<TenantId>) -> SyncTenantGuard {
    let id = tenant_id.into();
    let previous = SYNC_TENANT_ID.with(|cell| cell.replace(Some(id)));
    SyncTenantGuard { previous }
}

/// Get the tenant bound to the current thread.
#[inline]
pub fn sync_tenant_id() -> Option<TenantId> {
    SYNC_TENANT_ID.with(|cell| cell.borrow().clone())
}

/// Guard that restores the previous thread tenant when dropped.
#[must_use = "the tenant is unbound as soon as the guard is dropped"]
pub struct SyncTenantGuard {
    previous: Option<TenantId>,
}

impl Drop for SyncTenantGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        SYNC_TENANT_ID.with(|cell| *cell.borrow_mut() = previous);
    }
}
