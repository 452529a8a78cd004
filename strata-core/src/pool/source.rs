//! Bounded connection pool for one tenant.
//!
//! Connections are checked out as [`PooledConnection`] guards and go back to
//! the idle queue when the guard drops. Every checkout hands out a
//! connection in the configured auto-commit mode (off by default), and a
//! reused connection is reset first so no half-finished transaction leaks
//! from one unit of work into the next.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, trace, warn};

use super::connection::{Connection, ConnectionManager, Row};
use super::settings::PoolSettings;
use super::stats::{AtomicPoolStats, PoolStats};
use crate::error::{StrataError, StrataResult};

struct IdleConnection {
    conn: Box<dyn Connection>,
    created_at: Instant,
    last_used: Instant,
}

struct PoolInner {
    tenant_id: String,
    manager: Arc<dyn ConnectionManager>,
    settings: PoolSettings,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection>>,
    stats: AtomicPoolStats,
    closed: AtomicBool,
}

impl PoolInner {
    fn is_expired(&self, idle: &IdleConnection) -> bool {
        let lifetime_exceeded = self
            .settings
            .max_lifetime
            .is_some_and(|max| idle.created_at.elapsed() > max);
        let idle_exceeded = self
            .settings
            .idle_timeout
            .is_some_and(|max| idle.last_used.elapsed() > max);
        lifetime_exceeded || idle_exceeded
    }

    fn pop_idle(&self) -> Option<IdleConnection> {
        let mut idle = self.idle.lock();
        let next = idle.pop_front();
        self.stats.set_idle(idle.len());
        next
    }

    fn push_idle(&self, conn: IdleConnection) {
        let mut idle = self.idle.lock();
        idle.push_back(conn);
        self.stats.set_idle(idle.len());
    }

    fn closed_error(&self) -> StrataError {
        StrataError::acquisition(format!("pool for tenant '{}' is closed", self.tenant_id))
    }
}

/// A bounded pool of physical connections for exactly one tenant.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool. No connections are opened until the first checkout
    /// or an explicit [`warm_up`](Self::warm_up).
    pub fn new(
        tenant_id: impl Into<String>,
        manager: Arc<dyn ConnectionManager>,
        settings: PoolSettings,
    ) -> Self {
        let tenant_id = tenant_id.into();
        debug!(
            tenant = %tenant_id,
            max_connections = settings.max_connections,
            "Connection pool created"
        );

        Self {
            inner: Arc::new(PoolInner {
                tenant_id,
                manager,
                semaphore: Arc::new(Semaphore::new(settings.max_connections)),
                idle: Mutex::new(VecDeque::with_capacity(settings.max_connections)),
                settings,
                stats: AtomicPoolStats::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Check out a connection, waiting at most `connection_timeout`.
    pub async fn acquire(&self) -> StrataResult<PooledConnection> {
        if self.is_closed() {
            return Err(self.inner.closed_error());
        }

        let start = Instant::now();
        let timeout = self.inner.settings.connection_timeout;

        match tokio::time::timeout(timeout, self.checkout()).await {
            Ok(Ok(conn)) => {
                self.inner.stats.record_acquire(start.elapsed());
                trace!(tenant = %self.inner.tenant_id, "Connection acquired");
                Ok(conn)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.inner.stats.record_timeout();
                warn!(
                    tenant = %self.inner.tenant_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for a connection"
                );
                Err(StrataError::acquisition_timeout(&self.inner.tenant_id, timeout))
            }
        }
    }

    async fn checkout(&self) -> StrataResult<PooledConnection> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| self.inner.closed_error())?;

        while let Some(idle) = self.inner.pop_idle() {
            if self.inner.is_expired(&idle) {
                self.inner.stats.record_expired();
                trace!(tenant = %self.inner.tenant_id, "Closing expired idle connection");
                continue;
            }

            let mut conn = idle.conn;
            if self.inner.settings.test_before_acquire && !conn.is_valid().await {
                self.inner.stats.record_discard();
                debug!(tenant = %self.inner.tenant_id, "Discarding dead idle connection");
                continue;
            }
            if let Err(e) = self.prepare(&mut conn, true).await {
                self.inner.stats.record_discard();
                debug!(tenant = %self.inner.tenant_id, error = %e, "Discarding idle connection");
                continue;
            }

            self.inner.stats.record_reuse();
            return Ok(PooledConnection::new(
                conn,
                idle.created_at,
                permit,
                self.inner.clone(),
            ));
        }

        let mut conn = self.inner.manager.connect().await.map_err(|e| match e {
            e @ StrataError::Acquisition { .. } => e,
            other => StrataError::acquisition_with(
                format!("failed to open connection for tenant '{}'", self.inner.tenant_id),
                other,
            ),
        })?;
        self.prepare(&mut conn, false).await.map_err(|e| {
            StrataError::acquisition_with(
                format!("failed to prepare connection for tenant '{}'", self.inner.tenant_id),
                e,
            )
        })?;

        self.inner.stats.record_open();
        trace!(tenant = %self.inner.tenant_id, "Opened new connection");
        Ok(PooledConnection::new(
            conn,
            Instant::now(),
            permit,
            self.inner.clone(),
        ))
    }

    async fn prepare(&self, conn: &mut Box<dyn Connection>, reused: bool) -> StrataResult<()> {
        if reused {
            conn.reset().await?;
        }
        let auto_commit = self.inner.settings.auto_commit;
        if !reused || conn.auto_commit() != auto_commit {
            conn.set_auto_commit(auto_commit).await?;
        }
        Ok(())
    }

    /// Open connections until `min_idle` are idle.
    ///
    /// Failures are logged, not returned. Returns the number opened.
    pub async fn warm_up(&self) -> usize {
        let wanted = self
            .inner
            .settings
            .min_idle
            .min(self.inner.settings.max_connections)
            .saturating_sub(self.idle_count());
        let mut opened = 0;

        for _ in 0..wanted {
            let result = match self.inner.manager.connect().await {
                Ok(mut conn) => self.prepare(&mut conn, false).await.map(|_| conn),
                Err(e) => Err(e),
            };
            match result {
                Ok(conn) => {
                    let now = Instant::now();
                    self.inner.stats.record_open();
                    self.inner.push_idle(IdleConnection {
                        conn,
                        created_at: now,
                        last_used: now,
                    });
                    opened += 1;
                }
                Err(e) => {
                    warn!(tenant = %self.inner.tenant_id, error = %e, "Pool warm-up failed");
                    break;
                }
            }
        }

        if opened > 0 {
            info!(tenant = %self.inner.tenant_id, opened, "Pool warmed up");
        }
        opened
    }

    /// Close the pool: drop idle connections and reject new checkouts.
    ///
    /// Connections already checked out are closed when their guard drops.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.semaphore.close();
        let drained = {
            let mut idle = self.inner.idle.lock();
            let drained = idle.len();
            idle.clear();
            drained
        };
        self.inner.stats.set_idle(0);
        debug!(tenant = %self.inner.tenant_id, drained, "Connection pool closed");
    }

    /// Check if the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// The tenant this pool serves.
    pub fn tenant_id(&self) -> &str {
        &self.inner.tenant_id
    }

    /// The pool settings.
    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    /// Number of idle connections.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Number of checkouts still possible before callers have to wait.
    pub fn available_permits(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Get a snapshot of the pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.inner.stats.snapshot()
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("tenant_id", &self.inner.tenant_id)
            .field("settings", &self.inner.settings)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A checked-out connection that returns to its pool on drop.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    created_at: Instant,
    broken: bool,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    fn new(
        conn: Box<dyn Connection>,
        created_at: Instant,
        permit: OwnedSemaphorePermit,
        pool: Arc<PoolInner>,
    ) -> Self {
        Self {
            conn: Some(conn),
            created_at,
            broken: false,
            pool,
            _permit: permit,
        }
    }

    /// Close the connection instead of returning it to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// The tenant whose pool owns this connection.
    pub fn tenant_id(&self) -> &str {
        &self.pool.tenant_id
    }

    fn inner(&mut self) -> StrataResult<&mut Box<dyn Connection>> {
        self.conn
            .as_mut()
            .ok_or_else(|| StrataError::database("connection already returned to its pool"))
    }
}

#[async_trait]
impl Connection for PooledConnection {
    async fn execute(&mut self, sql: &str) -> StrataResult<u64> {
        self.inner()?.execute(sql).await
    }

    async fn query(&mut self, sql: &str) -> StrataResult<Vec<Row>> {
        self.inner()?.query(sql).await
    }

    async fn commit(&mut self) -> StrataResult<()> {
        self.inner()?.commit().await
    }

    async fn rollback(&mut self) -> StrataResult<()> {
        self.inner()?.rollback().await
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> StrataResult<()> {
        self.inner()?.set_auto_commit(enabled).await
    }

    fn auto_commit(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.auto_commit())
    }

    async fn is_valid(&mut self) -> bool {
        match self.conn.as_mut() {
            Some(conn) => conn.is_valid().await,
            None => false,
        }
    }

    async fn reset(&mut self) -> StrataResult<()> {
        self.inner()?.reset().await
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("tenant_id", &self.pool.tenant_id)
            .field("broken", &self.broken)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.stats.record_release();
        let Some(conn) = self.conn.take() else {
            return;
        };

        if self.broken || self.pool.closed.load(Ordering::Acquire) {
            self.pool.stats.record_discard();
            trace!(tenant = %self.pool.tenant_id, "Closing released connection");
            return;
        }

        trace!(tenant = %self.pool.tenant_id, "Returning connection to pool");
        self.pool.push_idle(IdleConnection {
            conn,
            created_at: self.created_at,
            last_used: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryManager;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn pool_with(manager: Arc<MemoryManager>, settings: PoolSettings) -> ConnectionPool {
        ConnectionPool::new("acme", manager, settings)
    }

    #[tokio::test]
    async fn test_checkout_disables_auto_commit() {
        let manager = Arc::new(MemoryManager::new());
        let pool = pool_with(manager.clone(), PoolSettings::default());

        let conn = pool.acquire().await.unwrap();
        assert!(!conn.auto_commit());
        assert_eq!(conn.tenant_id(), "acme");
        assert_eq!(manager.journal.auto_commit_off.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_reused_after_release() {
        let manager = Arc::new(MemoryManager::new());
        let pool = pool_with(manager.clone(), PoolSettings::default());

        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.idle_count(), 1);

        let _conn = pool.acquire().await.unwrap();
        assert_eq!(manager.opened(), 1);
        // reuse resets the connection with a rollback
        assert_eq!(manager.journal.rollbacks.load(Ordering::SeqCst), 1);

        let stats = pool.stats();
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.connections_reused, 1);
        assert_eq!(stats.in_use, 1);
    }

    #[tokio::test]
    async fn test_acquire_times_out() {
        let settings = PoolSettings::builder()
            .max_connections(1)
            .connection_timeout(Duration::from_millis(20))
            .build();
        let pool = pool_with(Arc::new(MemoryManager::new()), settings);

        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(err.is_acquisition_error());
        assert_eq!(pool.stats().timeouts, 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_acquisition_error() {
        let manager = Arc::new(MemoryManager::new());
        manager.fail.store(true, Ordering::SeqCst);
        let pool = pool_with(manager, PoolSettings::default());

        let err = pool.acquire().await.unwrap_err();
        assert!(err.is_acquisition_error());
        assert_eq!(pool.available_permits(), 10);
    }

    #[tokio::test]
    async fn test_broken_idle_connection_is_discarded() {
        let manager = Arc::new(MemoryManager::new());
        let pool = pool_with(manager.clone(), PoolSettings::default());

        drop(pool.acquire().await.unwrap());
        manager.valid.store(false, Ordering::SeqCst);

        let _conn = pool.acquire().await.unwrap();
        assert_eq!(manager.opened(), 2);
        assert_eq!(pool.stats().connections_discarded, 1);
    }

    #[tokio::test]
    async fn test_idle_connection_validated_before_reuse() {
        let manager = Arc::new(MemoryManager::new());
        let pool = pool_with(manager.clone(), PoolSettings::default());

        let _fresh = pool.acquire().await.unwrap();
        assert_eq!(manager.journal.validations.load(Ordering::SeqCst), 0);
        drop(_fresh);

        let _reused = pool.acquire().await.unwrap();
        assert_eq!(manager.journal.validations.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().connections_reused, 1);
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let manager = Arc::new(MemoryManager::new());
        let settings = PoolSettings::builder().test_before_acquire(false).build();
        let pool = pool_with(manager.clone(), settings);

        drop(pool.acquire().await.unwrap());
        let _conn = pool.acquire().await.unwrap();
        assert_eq!(manager.journal.validations.load(Ordering::SeqCst), 0);
        assert_eq!(manager.opened(), 1);
    }

    #[tokio::test]
    async fn test_marked_broken_not_returned() {
        let pool = pool_with(Arc::new(MemoryManager::new()), PoolSettings::default());

        let mut conn = pool.acquire().await.unwrap();
        conn.mark_broken();
        drop(conn);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_idle_connection_is_closed() {
        let settings = PoolSettings::builder()
            .idle_timeout(Duration::from_millis(1))
            .build();
        let manager = Arc::new(MemoryManager::new());
        let pool = pool_with(manager.clone(), settings);

        drop(pool.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let _conn = pool.acquire().await.unwrap();
        assert_eq!(manager.opened(), 2);
        assert_eq!(pool.stats().connections_expired, 1);
    }

    #[tokio::test]
    async fn test_close_rejects_checkout() {
        let pool = pool_with(Arc::new(MemoryManager::new()), PoolSettings::default());
        let conn = pool.acquire().await.unwrap();

        pool.close();
        assert!(pool.is_closed());
        assert!(pool.acquire().await.unwrap_err().is_acquisition_error());

        drop(conn);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_warm_up() {
        let settings = PoolSettings::builder().min_idle(3).build();
        let manager = Arc::new(MemoryManager::new());
        let pool = pool_with(manager.clone(), settings);

        assert_eq!(pool.warm_up().await, 3);
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.warm_up().await, 0);
        assert_eq!(manager.opened(), 3);
    }
}
