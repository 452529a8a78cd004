//! Driver lookup by name and named data sources.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::connection::ConnectionManager;
use crate::error::StrataResult;
use crate::tenant::TenantConfig;

/// A database driver, selected by a tenant's `jdbc_driver`.
pub trait Driver: Send + Sync {
    /// Primary driver name.
    fn name(&self) -> &str;

    /// Other names this driver answers to.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Build a connection manager for the tenant's URL and credentials.
    fn connection_manager(&self, config: &TenantConfig) -> StrataResult<Arc<dyn ConnectionManager>>;
}

/// Drivers indexed by name and alias.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its name and aliases.
    pub fn register(&mut self, driver: Arc<dyn Driver>) -> &mut Self {
        for alias in driver.aliases() {
            self.drivers.insert((*alias).to_string(), driver.clone());
        }
        self.drivers.insert(driver.name().to_string(), driver);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, driver: impl Driver + 'static) -> Self {
        self.register(Arc::new(driver));
        self
    }

    /// Look up a driver by name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name.trim()).cloned()
    }

    /// Check if a name or alias is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name.trim())
    }

    /// All registered names and aliases, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

/// Connection managers registered under a name, for tenants configured
/// with `jndi_name`.
#[derive(Clone, Default)]
pub struct DataSourceDirectory {
    sources: Arc<RwLock<HashMap<String, Arc<dyn ConnectionManager>>>>,
}

impl DataSourceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection manager to a name, replacing any previous binding.
    pub fn bind(&self, name: impl Into<String>, manager: Arc<dyn ConnectionManager>) -> &Self {
        self.sources.write().insert(name.into(), manager);
        self
    }

    /// Remove a binding.
    pub fn unbind(&self, name: &str) -> bool {
        self.sources.write().remove(name).is_some()
    }

    /// Look up a connection manager.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ConnectionManager>> {
        self.sources.read().get(name.trim()).cloned()
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DataSourceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.sources.read().keys().cloned().collect();
        names.sort_unstable();
        f.debug_struct("DataSourceDirectory")
            .field("sources", &names)
            .finish()
    }
}
