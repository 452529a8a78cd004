//! Per-tenant connection parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};

/// Connection parameters for one tenant.
///
/// A config is usable when either `jndi_name` names a registered data
/// source, or both `jdbc_driver` and `jdbc_url` are set. Blank strings count
/// as unset.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    /// Tenant identifier.
    pub id: String,
    /// Connection URL, e.g. `jdbc:sqlite:/srv/acme.db`.
    #[serde(default)]
    pub jdbc_url: Option<String>,
    /// Driver name registered in the [`crate::pool::DriverRegistry`].
    #[serde(default)]
    pub jdbc_driver: Option<String>,
    /// Database user.
    #[serde(default)]
    pub jdbc_user: Option<String>,
    /// Database password.
    #[serde(default)]
    pub jdbc_password: Option<String>,
    /// Name of a data source registered in the [`crate::pool::DataSourceDirectory`].
    #[serde(default)]
    pub jndi_name: Option<String>,
}

impl TenantConfig {
    /// Create a driver/URL based config.
    pub fn jdbc(
        id: impl Into<String>,
        driver: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            jdbc_url: Some(url.into()),
            jdbc_driver: Some(driver.into()),
            jdbc_user: None,
            jdbc_password: None,
            jndi_name: None,
        }
    }

    /// Create a config that points at a named data source.
    pub fn jndi(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            jdbc_url: None,
            jdbc_driver: None,
            jdbc_user: None,
            jdbc_password: None,
            jndi_name: Some(name.into()),
        }
    }

    /// Set the database credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.jdbc_user = Some(user.into());
        self.jdbc_password = Some(password.into());
        self
    }

    /// The driver name, if set and not blank.
    pub fn driver(&self) -> Option<&str> {
        non_blank(&self.jdbc_driver)
    }

    /// The connection URL, if set and not blank.
    pub fn url(&self) -> Option<&str> {
        non_blank(&self.jdbc_url)
    }

    /// The named data source, if set and not blank.
    pub fn data_source_name(&self) -> Option<&str> {
        non_blank(&self.jndi_name)
    }

    /// Check the jndi/jdbc invariant.
    pub fn validate(&self) -> StrataResult<&Self> {
        if self.data_source_name().is_some() {
            return Ok(self);
        }
        if self.driver().is_none() {
            return Err(StrataError::invalid_tenant_config(
                &self.id,
                "no jdbc driver specified",
            ));
        }
        if self.url().is_none() {
            return Err(StrataError::invalid_tenant_config(
                &self.id,
                "no jdbc url specified",
            ));
        }
        Ok(self)
    }

    /// Check if the config passes [`validate`](Self::validate).
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConfig")
            .field("id", &self.id)
            .field("jdbc_url", &self.jdbc_url)
            .field("jdbc_driver", &self.jdbc_driver)
            .field("jdbc_user", &self.jdbc_user)
            .field("jdbc_password", &self.jdbc_password.as_ref().map(|_| "***"))
            .field("jndi_name", &self.jndi_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jdbc_config_is_valid() {
        let config = TenantConfig::jdbc("acme", "sqlite", "jdbc:sqlite::memory:")
            .with_credentials("app", "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jndi_short_circuits_validation() {
        let config = TenantConfig::jndi("globex", "jdbc/globex");
        assert!(config.is_valid());
    }

    #[test]
    fn test_missing_driver() {
        let mut config = TenantConfig::jdbc("acme", "sqlite", "jdbc:sqlite::memory:");
        config.jdbc_driver = None;

        let err = config.validate().unwrap_err();
        match err {
            StrataError::InvalidTenantConfig { tenant_id, reason } => {
                assert_eq!(tenant_id, "acme");
                assert_eq!(reason, "no jdbc driver specified");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_url_is_missing() {
        let config = TenantConfig::jdbc("acme", "sqlite", "   ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no jdbc url specified"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = TenantConfig::jdbc("acme", "sqlite", "jdbc:sqlite::memory:")
            .with_credentials("app", "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
