//! Driver registration for tenant pools.

use std::sync::Arc;

use strata_core::{ConnectionManager, Driver, StrataError, StrataResult, TenantConfig};
use tracing::debug;

use crate::config::SqliteConfig;
use crate::connection::SqliteConnectionManager;

/// SQLite driver, registered as `sqlite` with the aliases `sqlite3` and
/// `org.sqlite.JDBC`.
///
/// The tenant's URL selects the database file; user and password are
/// accepted and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create the driver.
    pub fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn aliases(&self) -> &[&str] {
        &["sqlite3", "org.sqlite.JDBC"]
    }

    fn connection_manager(&self, config: &TenantConfig) -> StrataResult<Arc<dyn ConnectionManager>> {
        let url = config
            .url()
            .ok_or_else(|| StrataError::invalid_tenant_config(&config.id, "no jdbc url specified"))?;
        let sqlite = SqliteConfig::from_url(url)
            .map_err(|e| StrataError::invalid_tenant_config(&config.id, e.to_string()))?;

        debug!(tenant = %config.id, path = %sqlite.path.display(), "SQLite tenant database");
        Ok(Arc::new(SqliteConnectionManager::new(sqlite)))
    }
}
