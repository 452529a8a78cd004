//! Pool construction from tenant configuration.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::driver::{DataSourceDirectory, DriverRegistry};
use super::settings::PoolSettings;
use super::source::ConnectionPool;
use crate::error::{StrataError, StrataResult};
use crate::tenant::TenantConfig;

/// Creates a pool for a validated tenant config.
#[async_trait]
pub trait ConnectionPoolFactory: Send + Sync {
    /// Create a new pool for the tenant.
    async fn create(&self, config: &TenantConfig) -> StrataResult<Arc<ConnectionPool>>;
}

/// Builds pools from registered drivers and named data sources.
///
/// A tenant with `jndi_name` gets a pool over the directory's connection
/// manager; otherwise `jdbc_driver` selects a driver from the registry.
#[derive(Debug, Clone, Default)]
pub struct DriverPoolFactory {
    drivers: DriverRegistry,
    data_sources: DataSourceDirectory,
    settings: PoolSettings,
    warm_up: bool,
}

impl DriverPoolFactory {
    /// Create a factory over a driver registry.
    pub fn new(drivers: DriverRegistry) -> Self {
        Self {
            drivers,
            ..Self::default()
        }
    }

    /// Resolve `jndi_name` through this directory.
    pub fn data_sources(mut self, directory: DataSourceDirectory) -> Self {
        self.data_sources = directory;
        self
    }

    /// Settings for every created pool.
    pub fn settings(mut self, settings: PoolSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Open `min_idle` connections as soon as a pool is created.
    pub fn warm_up(mut self, enabled: bool) -> Self {
        self.warm_up = enabled;
        self
    }

    /// The driver registry.
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// The named data source directory.
    pub fn directory(&self) -> &DataSourceDirectory {
        &self.data_sources
    }
}

#[async_trait]
impl ConnectionPoolFactory for DriverPoolFactory {
    async fn create(&self, config: &TenantConfig) -> StrataResult<Arc<ConnectionPool>> {
        let (manager, source) = if let Some(name) = config.data_source_name() {
            let manager = self
                .data_sources
                .lookup(name)
                .ok_or_else(|| StrataError::UnknownDataSource {
                    tenant_id: config.id.clone(),
                    name: name.to_string(),
                })?;
            (manager, name.to_string())
        } else {
            let driver_name = config.driver().unwrap_or_default();
            let driver = self
                .drivers
                .get(driver_name)
                .ok_or_else(|| StrataError::UnknownDriver {
                    tenant_id: config.id.clone(),
                    driver: driver_name.to_string(),
                })?;
            (driver.connection_manager(config)?, driver.name().to_string())
        };

        let pool = ConnectionPool::new(&config.id, manager, self.settings.clone());
        if self.warm_up {
            pool.warm_up().await;
        }

        info!(
            tenant = %config.id,
            source = %source,
            max_connections = self.settings.max_connections,
            "Tenant pool created"
        );
        Ok(Arc::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDriver, MemoryManager};

    #[tokio::test]
    async fn test_create_from_driver() {
        let factory = DriverPoolFactory::new(DriverRegistry::new().with(MemoryDriver::default()));
        let pool = factory
            .create(&TenantConfig::jdbc("acme", "mem", "mem://acme"))
            .await
            .unwrap();
        assert_eq!(pool.tenant_id(), "acme");
    }

    #[tokio::test]
    async fn test_one_manager_per_pool() {
        let driver = Arc::new(MemoryDriver::default());
        let mut drivers = DriverRegistry::new();
        drivers.register(driver.clone());
        let factory = DriverPoolFactory::new(drivers);

        factory
            .create(&TenantConfig::jdbc("acme", "memory", "mem://acme"))
            .await
            .unwrap();
        factory
            .create(&TenantConfig::jdbc("globex", "mem", "mem://globex"))
            .await
            .unwrap();
        assert_eq!(driver.managers(), 2);

        factory
            .create(&TenantConfig::jdbc("initech", "oracle", "jdbc:oracle:thin:@db"))
            .await
            .unwrap_err();
        assert_eq!(driver.managers(), 2);
    }

    #[tokio::test]
    async fn test_unknown_driver() {
        let factory = DriverPoolFactory::new(DriverRegistry::new());
        let err = factory
            .create(&TenantConfig::jdbc("acme", "oracle", "jdbc:oracle:thin:@db"))
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::UnknownDriver { ref driver, .. } if driver == "oracle"));
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_create_from_data_source() {
        let manager = Arc::new(MemoryManager::new());
        let directory = DataSourceDirectory::new();
        directory.bind("jdbc/globex", manager.clone());

        let factory = DriverPoolFactory::new(DriverRegistry::new())
            .data_sources(directory)
            .settings(PoolSettings::builder().min_idle(2).build())
            .warm_up(true);

        let pool = factory
            .create(&TenantConfig::jndi("globex", "jdbc/globex"))
            .await
            .unwrap();
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(manager.opened(), 2);

        let err = factory
            .create(&TenantConfig::jndi("initech", "jdbc/initech"))
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::UnknownDataSource { .. }));
    }
}
