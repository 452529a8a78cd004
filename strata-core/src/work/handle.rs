//! The persistence handle bound to one unit of work.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{trace, warn};
use uuid::Uuid;

use super::context::ContextId;
use crate::error::{StrataError, StrataResult};
use crate::pool::{Connection, PooledConnection, Row};
use crate::tenant::TenantId;

/// A pooled connection shared between a handle and the transaction registry.
pub type SharedConnection = Arc<tokio::sync::Mutex<PooledConnection>>;

struct HandleInner {
    id: Uuid,
    tenant_id: TenantId,
    context: ContextId,
    unit: String,
    opened_at: Instant,
    connection: Mutex<Option<SharedConnection>>,
}

/// Handle to the persistence context of one unit of work.
///
/// Cloning a handle is cheap; all clones refer to the same connection.
/// After [`close`](Self::close) every operation fails with
/// [`StrataError::HandleClosed`].
#[derive(Clone)]
pub struct WorkUnitHandle {
    inner: Arc<HandleInner>,
}

impl WorkUnitHandle {
    pub(crate) fn new(
        tenant_id: TenantId,
        context: ContextId,
        unit: impl Into<String>,
        connection: PooledConnection,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                tenant_id,
                context,
                unit: unit.into(),
                opened_at: Instant::now(),
                connection: Mutex::new(Some(Arc::new(tokio::sync::Mutex::new(connection)))),
            }),
        }
    }

    /// Unique handle id.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The tenant the connection belongs to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.inner.tenant_id
    }

    /// The context the handle is bound to.
    pub fn context(&self) -> ContextId {
        self.inner.context
    }

    /// The persistence unit name.
    pub fn unit(&self) -> &str {
        &self.inner.unit
    }

    /// When the handle was opened.
    pub fn opened_at(&self) -> Instant {
        self.inner.opened_at
    }

    /// Check if the handle is still open.
    pub fn is_open(&self) -> bool {
        self.inner.connection.lock().is_some()
    }

    /// The underlying physical connection.
    pub fn connection(&self) -> StrataResult<SharedConnection> {
        self.inner
            .connection
            .lock()
            .clone()
            .ok_or_else(|| self.closed())
    }

    /// Execute a statement on the handle's connection.
    pub async fn execute(&self, sql: &str) -> StrataResult<u64> {
        let conn = self.connection()?;
        let mut conn = conn.lock().await;
        conn.execute(sql).await
    }

    /// Run a query on the handle's connection.
    pub async fn query(&self, sql: &str) -> StrataResult<Vec<Row>> {
        let conn = self.connection()?;
        let mut conn = conn.lock().await;
        conn.query(sql).await
    }

    /// Commit the current transaction.
    pub async fn commit(&self) -> StrataResult<()> {
        let conn = self.connection()?;
        let mut conn = conn.lock().await;
        conn.commit().await
    }

    /// Roll back the current transaction.
    pub async fn rollback(&self) -> StrataResult<()> {
        let conn = self.connection()?;
        let mut conn = conn.lock().await;
        conn.rollback().await
    }

    /// Close the handle, rolling back uncommitted work.
    ///
    /// The connection goes back to its pool once every clone of it is
    /// dropped. A connection that fails to roll back is closed instead.
    pub async fn close(&self) -> StrataResult<()> {
        let conn = self.inner.connection.lock().take().ok_or_else(|| self.closed())?;
        let mut conn = conn.lock().await;
        if let Err(e) = conn.reset().await {
            conn.mark_broken();
            return Err(e);
        }
        trace!(handle = %self.inner.id, "Work unit handle closed");
        Ok(())
    }

    /// Close without waiting: the rollback runs on the current runtime if
    /// there is one, otherwise the connection is released as is and reset
    /// at its next checkout.
    pub(crate) fn close_detached(&self) {
        let Some(conn) = self.inner.connection.lock().take() else {
            return;
        };
        let handle = self.inner.id;

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let mut conn = conn.lock().await;
                    if let Err(e) = conn.reset().await {
                        warn!(handle = %handle, error = %e, "Rollback on release failed");
                        conn.mark_broken();
                    }
                });
            }
            Err(_) => drop(conn),
        }
    }

    fn closed(&self) -> StrataError {
        StrataError::HandleClosed {
            handle: self.inner.id.to_string(),
        }
    }
}

impl PartialEq for WorkUnitHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for WorkUnitHandle {}

impl fmt::Debug for WorkUnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnitHandle")
            .field("id", &self.inner.id)
            .field("tenant_id", &self.inner.tenant_id)
            .field("context", &self.inner.context)
            .field("unit", &self.inner.unit)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ConnectionPool, PoolSettings};
    use crate::testing::MemoryManager;
    use std::sync::atomic::Ordering;

    async fn open(manager: Arc<MemoryManager>) -> (ConnectionPool, WorkUnitHandle) {
        let pool = ConnectionPool::new("acme", manager, PoolSettings::default());
        let conn = pool.acquire().await.unwrap();
        let handle = WorkUnitHandle::new("acme".into(), ContextId::next(), "erp", conn);
        (pool, handle)
    }

    #[tokio::test]
    async fn test_operations_reach_connection() {
        let manager = Arc::new(MemoryManager::new());
        let (_pool, handle) = open(manager.clone()).await;

        assert_eq!(handle.execute("INSERT INTO invoice VALUES (1)").await.unwrap(), 1);
        assert_eq!(handle.query("SELECT 1").await.unwrap().len(), 1);
        handle.commit().await.unwrap();

        assert_eq!(
            manager.journal.statements(),
            vec!["INSERT INTO invoice VALUES (1)".to_string(), "SELECT 1".to_string()]
        );
        assert_eq!(manager.journal.commits.load(Ordering::SeqCst), 1);
        assert_eq!(handle.tenant_id().as_str(), "acme");
        assert_eq!(handle.unit(), "erp");
    }

    #[tokio::test]
    async fn test_close_twice_fails() {
        let manager = Arc::new(MemoryManager::new());
        let (pool, handle) = open(manager.clone()).await;

        handle.close().await.unwrap();
        assert!(!handle.is_open());
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(manager.journal.rollbacks.load(Ordering::SeqCst), 1);

        assert!(matches!(handle.close().await, Err(StrataError::HandleClosed { .. })));
        assert!(matches!(handle.connection(), Err(StrataError::HandleClosed { .. })));
        assert!(handle.execute("SELECT 1").await.is_err());
    }

    #[tokio::test]
    async fn test_failed_rollback_discards_connection() {
        let manager = Arc::new(MemoryManager::new());
        let (pool, handle) = open(manager.clone()).await;

        manager.valid.store(false, Ordering::SeqCst);
        assert!(handle.close().await.is_err());
        assert!(!handle.is_open());
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_identity() {
        let (_pool, handle) = open(Arc::new(MemoryManager::new())).await;
        let clone = handle.clone();
        assert_eq!(handle, clone);

        clone.close().await.unwrap();
        assert!(!handle.is_open());
    }
}
