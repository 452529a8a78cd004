//! Wiring of router, lifecycle, and unit of work into one service.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::config::StrataConfig;
use crate::error::{StrataError, StrataResult};
use crate::pool::{
    ConnectionPoolFactory, DataSourceDirectory, DriverPoolFactory, DriverRegistry, PoolSettings,
};
use crate::tenant::{
    DEFAULT_TENANT_ID, StaticConfigProvider, TenantConfigProvider, TenantConnectionRouter, TenantId,
};
use crate::work::{
    PersistenceLifecycle, Properties, TransactionRegistry, UnitOfWork, WorkUnitHandle,
    with_unit_of_work,
};

/// A multi-tenant persistence unit: tenant routing, lifecycle, and units of
/// work over one shared transaction registry.
///
/// ```rust,ignore
/// let service = PersistenceService::from_config(&config, drivers)?;
/// service.start(None)?;
///
/// with_tenant("acme", service.run(async {
///     let handle = service.get().await?;
///     handle.execute("DELETE FROM session WHERE expired = 1").await?;
///     handle.commit().await
/// }))
/// .await?;
///
/// service.stop()?;
/// ```
#[derive(Debug, Clone)]
pub struct PersistenceService {
    router: Arc<TenantConnectionRouter>,
    lifecycle: Arc<PersistenceLifecycle>,
    unit_of_work: Arc<UnitOfWork>,
}

impl PersistenceService {
    /// Create a builder.
    pub fn builder() -> PersistenceServiceBuilder {
        PersistenceServiceBuilder::default()
    }

    /// Build a service from `strata.toml` settings with the given drivers.
    pub fn from_config(config: &StrataConfig, drivers: DriverRegistry) -> StrataResult<Self> {
        Self::builder()
            .unit(&config.persistence.unit)
            .default_tenant(&config.persistence.default_tenant)
            .auto_begin(config.persistence.auto_begin)
            .properties(config.persistence.properties.clone())
            .provider(StaticConfigProvider::from_configs(config.tenants.iter().cloned()))
            .drivers(drivers)
            .pool_settings(config.pool_settings()?)
            .warm_up(config.pool.min_idle > 0)
            .build()
    }

    /// Start the persistence unit.
    pub fn start(&self, properties: Option<Properties>) -> StrataResult<()> {
        self.lifecycle.start(properties)
    }

    /// Stop the persistence unit and close every tenant pool.
    pub fn stop(&self) -> StrataResult<()> {
        self.lifecycle.stop()
    }

    /// Begin work on the calling context.
    pub async fn begin(&self) -> StrataResult<WorkUnitHandle> {
        self.unit_of_work.begin().await
    }

    /// The handle of the calling context.
    pub async fn get(&self) -> StrataResult<WorkUnitHandle> {
        self.unit_of_work.get().await
    }

    /// End work on the calling context.
    pub async fn end(&self) -> StrataResult<()> {
        self.unit_of_work.end().await
    }

    /// Run `f` as one unit of work, see [`with_unit_of_work`].
    pub async fn run<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: Future<Output = StrataResult<T>>,
    {
        with_unit_of_work(&self.unit_of_work, f).await
    }

    /// The unit of work manager.
    pub fn unit_of_work(&self) -> &Arc<UnitOfWork> {
        &self.unit_of_work
    }

    /// The persistence lifecycle.
    pub fn lifecycle(&self) -> &Arc<PersistenceLifecycle> {
        &self.lifecycle
    }

    /// The tenant router.
    pub fn router(&self) -> &Arc<TenantConnectionRouter> {
        &self.router
    }

    /// The transaction registry.
    pub fn transactions(&self) -> &Arc<TransactionRegistry> {
        self.unit_of_work.transactions()
    }
}

/// Builder for [`PersistenceService`].
#[derive(Default)]
pub struct PersistenceServiceBuilder {
    unit: Option<String>,
    provider: Option<Arc<dyn TenantConfigProvider>>,
    factory: Option<Arc<dyn ConnectionPoolFactory>>,
    drivers: DriverRegistry,
    data_sources: DataSourceDirectory,
    pool_settings: PoolSettings,
    warm_up: bool,
    properties: Properties,
    default_tenant: Option<String>,
    auto_begin: Option<bool>,
    transactions: Option<Arc<TransactionRegistry>>,
}

impl PersistenceServiceBuilder {
    /// Persistence unit name (default `"default"`).
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Tenant config provider (required).
    pub fn provider(mut self, provider: impl TenantConfigProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Use a custom pool factory instead of the driver-based one.
    pub fn pool_factory(mut self, factory: Arc<dyn ConnectionPoolFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Drivers for tenants configured with `jdbc_driver`.
    pub fn drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    /// Data sources for tenants configured with `jndi_name`.
    pub fn data_sources(mut self, directory: DataSourceDirectory) -> Self {
        self.data_sources = directory;
        self
    }

    /// Settings for every tenant pool.
    pub fn pool_settings(mut self, settings: PoolSettings) -> Self {
        self.pool_settings = settings;
        self
    }

    /// Open `min_idle` connections when a tenant pool is created.
    pub fn warm_up(mut self, enabled: bool) -> Self {
        self.warm_up = enabled;
        self
    }

    /// Properties every start begins with.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Tenant used when none is bound to the request.
    pub fn default_tenant(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.default_tenant = Some(tenant_id.into().into_inner());
        self
    }

    /// Whether `get()` begins work on an idle context (default `true`).
    pub fn auto_begin(mut self, enabled: bool) -> Self {
        self.auto_begin = Some(enabled);
        self
    }

    /// Share an existing transaction registry.
    pub fn transactions(mut self, registry: Arc<TransactionRegistry>) -> Self {
        self.transactions = Some(registry);
        self
    }

    /// Build the service.
    pub fn build(self) -> StrataResult<PersistenceService> {
        let provider = self
            .provider
            .ok_or_else(|| StrataError::config("no tenant config provider configured"))?;
        let factory: Arc<dyn ConnectionPoolFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(
                DriverPoolFactory::new(self.drivers)
                    .data_sources(self.data_sources)
                    .settings(self.pool_settings)
                    .warm_up(self.warm_up),
            ),
        };

        let unit = self.unit.unwrap_or_else(|| "default".to_string());
        let router = Arc::new(TenantConnectionRouter::new(provider, factory));
        let lifecycle = Arc::new(
            PersistenceLifecycle::new(unit.clone(), router.clone())
                .stop_with(router.clone())
                .properties(self.properties)
                .default_tenant(
                    self.default_tenant
                        .unwrap_or_else(|| DEFAULT_TENANT_ID.to_string()),
                ),
        );
        let unit_of_work = Arc::new(
            UnitOfWork::new(
                lifecycle.clone(),
                self.transactions.unwrap_or_default(),
            )
            .auto_begin(self.auto_begin.unwrap_or(true)),
        );

        debug!(unit = %unit, "Persistence service built");
        Ok(PersistenceService {
            router,
            lifecycle,
            unit_of_work,
        })
    }
}
