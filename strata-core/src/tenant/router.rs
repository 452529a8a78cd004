//! Tenant to connection pool routing.
//!
//! [`TenantConnectionRouter`] keeps one [`ConnectionPool`] per tenant. The
//! registry maps tenant ids to per-key [`OnceCell`]s: lookups of an existing
//! pool take only a read lock, and first use of a tenant inserts an empty
//! cell under a short write lock and builds the pool outside any lock.
//! Concurrent first use of the same tenant therefore constructs exactly one
//! pool; the other callers wait on the cell.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use super::context::TenantId;
use super::provider::TenantConfigProvider;
use crate::error::{StrataError, StrataResult};
use crate::pool::{ConnectionPool, ConnectionPoolFactory};

/// Routes a tenant id to the pool that serves it.
#[async_trait]
pub trait TenantRouting: Send + Sync {
    /// Get the pool for a tenant.
    async fn route(&self, tenant_id: &TenantId) -> StrataResult<Arc<ConnectionPool>>;
}

/// A resource that holds connections and can be shut down.
pub trait Stoppable: Send + Sync {
    /// Release everything the resource holds.
    fn stop(&self);
}

type PoolCell = Arc<OnceCell<Arc<ConnectionPool>>>;

/// Lazily creates and caches one connection pool per tenant.
pub struct TenantConnectionRouter {
    provider: Arc<dyn TenantConfigProvider>,
    factory: Arc<dyn ConnectionPoolFactory>,
    pools: RwLock<HashMap<String, PoolCell>>,
}

impl TenantConnectionRouter {
    /// Create a router over a config provider and a pool factory.
    pub fn new(
        provider: Arc<dyn TenantConfigProvider>,
        factory: Arc<dyn ConnectionPoolFactory>,
    ) -> Self {
        Self {
            provider,
            factory,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Get the pool for a tenant, creating it on first use.
    ///
    /// Fails with [`StrataError::TenantNotFound`] when the provider does not
    /// know the tenant, dropping any pool still cached for it. The config is
    /// validated only when a pool has to be built.
    pub async fn resolve(&self, tenant_id: &TenantId) -> StrataResult<Arc<ConnectionPool>> {
        let Some(config) = self.provider.find(tenant_id).await else {
            self.evict(tenant_id.as_str());
            debug!(tenant = %tenant_id, "Tenant not found");
            return Err(StrataError::tenant_not_found(tenant_id.as_str()));
        };

        let cell = self.cell_for(tenant_id.as_str());
        if let Some(pool) = cell.get() {
            trace!(tenant = %tenant_id, "Using cached pool");
            return Ok(pool.clone());
        }

        let pool = cell
            .get_or_try_init(|| async {
                config.validate()?;
                self.factory.create(&config).await
            })
            .await?;
        Ok(pool.clone())
    }

    fn cell_for(&self, tenant_id: &str) -> PoolCell {
        if let Some(cell) = self.pools.read().get(tenant_id) {
            return cell.clone();
        }
        self.pools
            .write()
            .entry(tenant_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the cached pool for a tenant and close it.
    ///
    /// Returns `true` if a pool was cached.
    pub fn evict(&self, tenant_id: &str) -> bool {
        let removed = self.pools.write().remove(tenant_id);
        match removed.as_ref().and_then(|cell| cell.get()) {
            Some(pool) => {
                pool.close();
                debug!(tenant = %tenant_id, "Evicted tenant pool");
                true
            }
            None => false,
        }
    }

    /// Check if a pool is cached for a tenant.
    pub fn is_cached(&self, tenant_id: &str) -> bool {
        self.pools
            .read()
            .get(tenant_id)
            .is_some_and(|cell| cell.initialized())
    }

    /// Tenants with a cached pool, sorted.
    pub fn cached_tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self
            .pools
            .read()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        tenants.sort_unstable();
        tenants
    }

    /// Number of cached pools.
    pub fn pool_count(&self) -> usize {
        self.pools
            .read()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}

#[async_trait]
impl TenantRouting for TenantConnectionRouter {
    async fn route(&self, tenant_id: &TenantId) -> StrataResult<Arc<ConnectionPool>> {
        self.resolve(tenant_id).await
    }
}

impl Stoppable for TenantConnectionRouter {
    /// Close and forget every cached pool. Later lookups build new pools.
    fn stop(&self) {
        let drained: Vec<PoolCell> = self.pools.write().drain().map(|(_, cell)| cell).collect();
        let mut closed = 0;
        for pool in drained.iter().filter_map(|cell| cell.get()) {
            pool.close();
            closed += 1;
        }
        debug!(closed, "Tenant router stopped");
    }
}

impl fmt::Debug for TenantConnectionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConnectionRouter")
            .field("cached_tenants", &self.cached_tenants())
            .finish()
    }
}

/// Routes every tenant to the same pool, for single-database deployments.
#[derive(Debug, Clone)]
pub struct FixedRouting {
    pool: Arc<ConnectionPool>,
}

impl FixedRouting {
    /// Route everything to `pool`.
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRouting for FixedRouting {
    async fn route(&self, _tenant_id: &TenantId) -> StrataResult<Arc<ConnectionPool>> {
        Ok(self.pool.clone())
    }
}

impl Stoppable for FixedRouting {
    fn stop(&self) {
        self.pool.close();
    }
}
