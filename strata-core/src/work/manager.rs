//! Binding one work unit handle to each execution context.
//!
//! A context is idle until [`UnitOfWork::begin`] opens a handle for it and
//! active until [`UnitOfWork::end`] closes it again. While active, the
//! handle's connection is also bound in the [`TransactionRegistry`] so other
//! transactional code on the context sees the same connection.
//!
//! ```rust,ignore
//! use strata_core::work::with_work_context;
//!
//! with_work_context(async {
//!     uow.begin().await?;
//!     let handle = uow.get().await?;
//!     handle.execute("UPDATE account SET balance = balance - 10 WHERE id = 1").await?;
//!     handle.commit().await?;
//!     uow.end().await
//! })
//! .await?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::context::ContextId;
use super::context_map::ContextMap;
use super::handle::WorkUnitHandle;
use super::lifecycle::PersistenceLifecycle;
use super::scope::WorkUnitGuard;
use super::transaction::{ResourceKey, TransactionRegistry};
use crate::error::{StrataError, StrataResult};
use crate::tenant::{TenantId, current_tenant_id};

/// Manages the work unit handle of every execution context.
pub struct UnitOfWork {
    lifecycle: Arc<PersistenceLifecycle>,
    transactions: Arc<TransactionRegistry>,
    handles: ContextMap<WorkUnitHandle>,
    resource_key: ResourceKey,
    auto_begin: bool,
}

impl UnitOfWork {
    /// Create a manager over a lifecycle and a transaction registry.
    ///
    /// Connections are bound in the registry under the unit name.
    pub fn new(lifecycle: Arc<PersistenceLifecycle>, transactions: Arc<TransactionRegistry>) -> Self {
        let resource_key = ResourceKey::new(lifecycle.unit());
        Self {
            lifecycle,
            transactions,
            handles: ContextMap::new(),
            resource_key,
            auto_begin: true,
        }
    }

    /// Whether [`get`](Self::get) begins work on an idle context.
    pub fn auto_begin(mut self, enabled: bool) -> Self {
        self.auto_begin = enabled;
        self
    }

    /// Begin work on the calling context.
    pub async fn begin(&self) -> StrataResult<WorkUnitHandle> {
        self.begin_in(ContextId::current()).await
    }

    /// Begin work on the calling context for an explicit tenant.
    pub async fn begin_for(&self, tenant_id: impl Into<TenantId>) -> StrataResult<WorkUnitHandle> {
        self.open(ContextId::current(), Some(tenant_id.into())).await
    }

    /// Begin work on `context`, routed to the tenant bound to the request.
    ///
    /// Fails with [`StrataError::DoubleBegin`] if the context is already
    /// active; the existing handle stays bound.
    pub async fn begin_in(&self, context: ContextId) -> StrataResult<WorkUnitHandle> {
        self.open(context, None).await
    }

    async fn open(&self, context: ContextId, tenant_id: Option<TenantId>) -> StrataResult<WorkUnitHandle> {
        if self.handles.contains(context) {
            return Err(StrataError::DoubleBegin { context });
        }

        let engine = self.lifecycle.engine()?;
        let tenant_id = tenant_id
            .or_else(current_tenant_id)
            .unwrap_or_else(|| engine.default_tenant().clone());
        let handle = engine.open_handle(tenant_id, context).await?;

        if let Err(handle) = self.handles.try_insert(context, handle.clone()) {
            self.discard(&handle).await;
            return Err(StrataError::DoubleBegin { context });
        }

        if let Err(e) = self.bind(context, &handle) {
            self.handles.remove(context);
            self.discard(&handle).await;
            return Err(e);
        }

        debug!(
            context = %context,
            tenant = %handle.tenant_id(),
            handle = %handle.id(),
            "Unit of work begun"
        );
        Ok(handle)
    }

    fn bind(&self, context: ContextId, handle: &WorkUnitHandle) -> StrataResult<()> {
        let connection = handle.connection()?;
        self.transactions.set_actual_transaction_active(context, true);

        if let Err(e) = self.transactions.init_synchronization(context) {
            self.transactions.set_actual_transaction_active(context, false);
            return Err(e);
        }

        if let Err(e) = self
            .transactions
            .bind_resource(context, self.resource_key.clone(), connection)
        {
            self.transactions.clear_synchronization(context);
            self.transactions.set_actual_transaction_active(context, false);
            return Err(e);
        }
        Ok(())
    }

    fn unbind(&self, context: ContextId) {
        self.transactions.unbind_resource(context, &self.resource_key);
        self.transactions.clear_synchronization(context);
        self.transactions.set_actual_transaction_active(context, false);
    }

    async fn discard(&self, handle: &WorkUnitHandle) {
        if let Err(e) = handle.close().await {
            warn!(handle = %handle.id(), error = %e, "Failed to close discarded handle");
        }
    }

    /// The handle of the calling context, beginning work if it is idle.
    pub async fn get(&self) -> StrataResult<WorkUnitHandle> {
        self.get_in(ContextId::current()).await
    }

    /// The handle of `context`, beginning work if it is idle.
    ///
    /// With auto-begin disabled an idle context fails with
    /// [`StrataError::NoActiveWork`] instead.
    pub async fn get_in(&self, context: ContextId) -> StrataResult<WorkUnitHandle> {
        if let Some(handle) = self.handles.get(context) {
            return Ok(handle);
        }
        if !self.auto_begin {
            return Err(StrataError::NoActiveWork { context });
        }
        self.begin_in(context).await
    }

    /// End work on the calling context.
    pub async fn end(&self) -> StrataResult<()> {
        self.end_in(ContextId::current()).await
    }

    /// End work on `context`. Ending an idle context does nothing.
    ///
    /// The handle is unbound and the context becomes idle before the
    /// handle is closed, so a failing close still leaves the context idle;
    /// the close error is returned afterwards.
    pub async fn end_in(&self, context: ContextId) -> StrataResult<()> {
        let Some(handle) = self.handles.remove(context) else {
            return Ok(());
        };
        self.unbind(context);

        let closed = handle.close().await;
        debug!(context = %context, handle = %handle.id(), "Unit of work ended");
        match closed {
            Err(StrataError::HandleClosed { .. }) => Ok(()),
            other => other,
        }
    }

    /// End work on `context` without waiting for the handle to close.
    pub(crate) fn release_in(&self, context: ContextId) {
        if let Some(handle) = self.handles.remove(context) {
            self.unbind(context);
            handle.close_detached();
            debug!(context = %context, handle = %handle.id(), "Unit of work released");
        }
    }

    /// Guard that ends work on the calling context when dropped.
    pub fn guard(&self) -> WorkUnitGuard<'_> {
        WorkUnitGuard::new(self, ContextId::current())
    }

    /// Check if the calling context has active work.
    pub fn is_working(&self) -> bool {
        self.is_working_in(ContextId::current())
    }

    /// Check if `context` has active work.
    pub fn is_working_in(&self, context: ContextId) -> bool {
        self.handles.contains(context)
    }

    /// Number of contexts with active work.
    pub fn active_count(&self) -> usize {
        self.handles.len()
    }

    /// The lifecycle this manager opens handles through.
    pub fn lifecycle(&self) -> &Arc<PersistenceLifecycle> {
        &self.lifecycle
    }

    /// The registry connections are bound in.
    pub fn transactions(&self) -> &Arc<TransactionRegistry> {
        &self.transactions
    }

    /// The key connections are bound under.
    pub fn resource_key(&self) -> &ResourceKey {
        &self.resource_key
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("unit", &self.lifecycle.unit())
            .field("auto_begin", &self.auto_begin)
            .field("active", &self.active_count())
            .finish()
    }
}
