//! Configuration file parsing for `strata.toml`.
//!
//! ```toml
//! [persistence]
//! unit = "app"
//! default_tenant = "default"
//!
//! [persistence.properties]
//! "strata.statement_timeout" = "5s"
//!
//! [pool]
//! max_connections = 10
//! connection_timeout = "30s"
//!
//! [[tenants]]
//! id = "acme"
//! jdbc_driver = "sqlite"
//! jdbc_url = "jdbc:sqlite:${DATA_DIR}/acme.db"
//! ```
//!
//! Environment references are expanded before the TOML is parsed.

mod env;

pub use env::{EnvExpander, EnvSource, MapEnvSource, StdEnvSource};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{StrataError, StrataResult};
use crate::pool::PoolSettings;
use crate::tenant::TenantConfig;
use crate::work::Properties;

/// Main configuration structure for `strata.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Persistence unit settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Per-tenant pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Statically configured tenants.
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl StrataConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| StrataError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let config = Self::from_str(&content)?;
        info!(
            path = %path.display(),
            unit = %config.persistence.unit,
            tenants = config.tenants.len(),
            "Strata configuration loaded"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string, expanding the process environment.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> StrataResult<Self> {
        Self::from_str_with_env(content, &EnvExpander::new())
    }

    /// Parse configuration from a TOML string with a custom environment.
    pub fn from_str_with_env<S: EnvSource>(
        content: &str,
        expander: &EnvExpander<S>,
    ) -> StrataResult<Self> {
        let expanded = expander.expand(content)?;
        Ok(toml::from_str(&expanded)?)
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(pool) = overrides.pool {
                self.pool = pool;
            }
            if let Some(persistence) = overrides.persistence {
                if let Some(unit) = persistence.unit {
                    self.persistence.unit = unit;
                }
                if let Some(default_tenant) = persistence.default_tenant {
                    self.persistence.default_tenant = default_tenant;
                }
                if let Some(auto_begin) = persistence.auto_begin {
                    self.persistence.auto_begin = auto_begin;
                }
                self.persistence.properties.extend(persistence.properties);
            }
        }
        self
    }

    /// Get the runtime pool settings.
    pub fn pool_settings(&self) -> StrataResult<PoolSettings> {
        self.pool.to_settings()
    }
}

/// Persistence unit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Persistence unit name.
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Tenant used when a unit of work begins without a bound tenant.
    #[serde(default = "default_tenant")]
    pub default_tenant: String,

    /// Whether `get()` begins a unit of work implicitly.
    #[serde(default = "default_true")]
    pub auto_begin: bool,

    /// Properties passed to the persistence engine on start.
    #[serde(default)]
    pub properties: Properties,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            default_tenant: default_tenant(),
            auto_begin: true,
            properties: BTreeMap::new(),
        }
    }
}

fn default_unit() -> String { "default".to_string() }
fn default_tenant() -> String { crate::tenant::DEFAULT_TENANT_ID.to_string() }
fn default_true() -> bool { true }

/// Connection pool configuration as written in the file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum connections per tenant pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connections opened eagerly when a tenant pool is created.
    #[serde(default)]
    pub min_idle: usize,

    /// Maximum wait for a connection.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: String,

    /// Idle connection timeout.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,

    /// Maximum connection lifetime.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime: String,

    /// Validate idle connections before reuse.
    #[serde(default = "default_true")]
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_idle: 0,
            connection_timeout: default_connection_timeout(),
            idle_timeout: default_idle_timeout(),
            max_lifetime: default_max_lifetime(),
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    /// Convert to runtime settings, parsing the duration strings.
    pub fn to_settings(&self) -> StrataResult<PoolSettings> {
        if self.max_connections == 0 {
            return Err(StrataError::config("pool.max_connections must be at least 1"));
        }

        Ok(PoolSettings::builder()
            .max_connections(self.max_connections)
            .min_idle(self.min_idle)
            .connection_timeout(parse_duration(&self.connection_timeout)?)
            .idle_timeout(parse_duration(&self.idle_timeout)?)
            .max_lifetime(parse_duration(&self.max_lifetime)?)
            .test_before_acquire(self.test_before_acquire)
            .build())
    }
}

fn default_max_connections() -> usize { 10 }
fn default_connection_timeout() -> String { "30s".to_string() }
fn default_idle_timeout() -> String { "10m".to_string() }
fn default_max_lifetime() -> String { "30m".to_string() }

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Pool overrides (replace the whole section).
    pub pool: Option<PoolConfig>,

    /// Persistence overrides.
    pub persistence: Option<PersistenceOverride>,
}

/// Persistence configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceOverride {
    /// Override the unit name.
    pub unit: Option<String>,

    /// Override the default tenant.
    pub default_tenant: Option<String>,

    /// Override auto-begin.
    pub auto_begin: Option<bool>,

    /// Extra properties merged over the base properties.
    #[serde(default)]
    pub properties: Properties,
}

/// Parse a duration such as `250ms`, `30s`, `10m`, or `2h`.
///
/// A bare number is read as seconds.
pub fn parse_duration(input: &str) -> StrataResult<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| StrataError::config(format!("invalid duration '{}'", input)))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(StrataError::config(format!(
            "invalid duration unit '{}' in '{}'",
            other, input
        ))),
    }
}
