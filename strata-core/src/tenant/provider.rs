//! Tenant configuration lookup.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::config::TenantConfig;
use super::context::TenantId;

/// Resolves a tenant id to its connection parameters.
///
/// `None` means the tenant is unknown (or was deleted); the router treats
/// that as a signal to drop any pool it cached for the tenant.
#[async_trait]
pub trait TenantConfigProvider: Send + Sync {
    /// Look up the config for a tenant.
    async fn find(&self, tenant_id: &TenantId) -> Option<TenantConfig>;
}

#[async_trait]
impl<P: TenantConfigProvider + ?Sized> TenantConfigProvider for Arc<P> {
    async fn find(&self, tenant_id: &TenantId) -> Option<TenantConfig> {
        (**self).find(tenant_id).await
    }
}

/// An in-memory provider whose tenants can change at runtime.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    tenants: Arc<RwLock<HashMap<String, TenantConfig>>>,
}

impl StaticConfigProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider from a list of tenant configs.
    pub fn from_configs(configs: impl IntoIterator<Item = TenantConfig>) -> Self {
        let provider = Self::new();
        for config in configs {
            provider.register(config);
        }
        provider
    }

    /// Register or replace a tenant.
    pub fn register(&self, config: TenantConfig) -> &Self {
        self.tenants.write().insert(config.id.clone(), config);
        self
    }

    /// Remove a tenant.
    pub fn unregister(&self, tenant_id: &str) -> Option<TenantConfig> {
        self.tenants.write().remove(tenant_id)
    }

    /// Check if a tenant is registered.
    pub fn contains(&self, tenant_id: &str) -> bool {
        self.tenants.read().contains_key(tenant_id)
    }

    /// Get the number of registered tenants.
    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TenantConfigProvider for StaticConfigProvider {
    async fn find(&self, tenant_id: &TenantId) -> Option<TenantConfig> {
        self.tenants.read().get(tenant_id.as_str()).cloned()
    }
}

/// Type alias for async lookup functions.
pub type FindFn =
    Arc<dyn Fn(TenantId) -> Pin<Box<dyn Future<Output = Option<TenantConfig>> + Send>> + Send + Sync>;

/// A provider backed by an async callback, e.g. a query against a tenant
/// directory service.
pub struct FnConfigProvider {
    find_fn: FindFn,
}

impl FnConfigProvider {
    /// Create a provider from a callback.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(TenantId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<TenantConfig>> + Send + 'static,
    {
        Self {
            find_fn: Arc::new(move |id| Box::pin(f(id))),
        }
    }
}

impl std::fmt::Debug for FnConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnConfigProvider").finish()
    }
}

#[async_trait]
impl TenantConfigProvider for FnConfigProvider {
    async fn find(&self, tenant_id: &TenantId) -> Option<TenantConfig> {
        (self.find_fn)(tenant_id.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticConfigProvider::from_configs([TenantConfig::jdbc(
            "acme",
            "sqlite",
            "jdbc:sqlite::memory:",
        )]);

        assert!(provider.contains("acme"));
        assert_eq!(provider.len(), 1);

        let found = provider.find(&TenantId::new("acme")).await.unwrap();
        assert_eq!(found.id, "acme");
        assert!(provider.find(&TenantId::new("ghost")).await.is_none());

        provider.unregister("acme");
        assert!(provider.find(&TenantId::new("acme")).await.is_none());
        assert!(provider.is_empty());
    }

    #[tokio::test]
    async fn test_fn_provider() {
        let provider = FnConfigProvider::new(|id: TenantId| async move {
            id.as_str()
                .starts_with("t-")
                .then(|| TenantConfig::jndi(id.as_str(), "jdbc/shared"))
        });

        assert!(provider.find(&TenantId::new("t-42")).await.is_some());
        assert!(provider.find(&TenantId::new("ghost")).await.is_none());
    }
}
