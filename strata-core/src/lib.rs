//! # strata-core
//!
//! Multi-tenant data access for Strata.
//!
//! This crate provides:
//! - Tenant configuration records and their validation
//! - Pluggable tenant config providers
//! - One lazily created connection pool per tenant, routed by tenant id
//! - Units of work bound to execution contexts (`begin` / `get` / `end`)
//! - A persistence lifecycle that is started and stopped once per run
//! - A per-context transaction registry exposing the active connection
//!
//! ## Tenant Configuration
//!
//! ```rust
//! use strata_core::TenantConfig;
//!
//! let direct = TenantConfig::jdbc("acme", "sqlite", "jdbc:sqlite:/var/lib/acme.db");
//! assert!(direct.validate().is_ok());
//!
//! let named = TenantConfig::jndi("globex", "jdbc/globex");
//! assert!(named.validate().is_ok());
//!
//! let broken = TenantConfig::jdbc("initech", "sqlite", "");
//! assert!(broken.validate().is_err());
//! ```
//!
//! ## Units of Work
//!
//! ```rust,ignore
//! use strata_core::prelude::*;
//!
//! let service = PersistenceService::from_config(&config, drivers)?;
//! service.start(None)?;
//!
//! with_tenant("acme", service.run(async {
//!     let handle = service.get().await?;
//!     handle.execute("UPDATE invoice SET paid = 1 WHERE id = 7").await?;
//!     handle.commit().await
//! }))
//! .await?;
//!
//! service.stop()?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod service;
pub mod tenant;
pub mod work;

#[cfg(test)]
pub(crate) mod testing;

pub use config::StrataConfig;
pub use error::{BoxError, ErrorCode, StrataError, StrataResult};
pub use pool::{
    Connection, ConnectionManager, ConnectionPool, ConnectionPoolFactory, DataSourceDirectory,
    Driver, DriverPoolFactory, DriverRegistry, PoolSettings, PoolStats, PooledConnection, Row,
};
pub use service::{PersistenceService, PersistenceServiceBuilder};
pub use tenant::{
    StaticConfigProvider, TenantConfig, TenantConfigProvider, TenantConnectionRouter, TenantId,
};
pub use work::{
    ContextId, PersistenceLifecycle, TransactionRegistry, UnitOfWork, WorkUnitHandle,
    with_unit_of_work,
};

// Re-export logging utilities
pub use logging::{
    get_log_format, get_log_level, init as init_logging, init_debug, init_with_level,
    is_debug_enabled,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::StrataConfig;
    pub use crate::error::{StrataError, StrataResult};
    pub use crate::pool::{Connection, ConnectionPoolFactory, DriverRegistry, PoolSettings};
    pub use crate::service::PersistenceService;
    pub use crate::tenant::{
        TenantConfig, TenantConfigProvider, TenantId, current_tenant_id, with_tenant,
    };
    pub use crate::work::{
        PersistenceLifecycle, UnitOfWork, WorkUnitHandle, with_unit_of_work, with_work_context,
    };
}
