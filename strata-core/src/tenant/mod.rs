//! Tenant resolution and per-tenant connection routing.
//!
//! Each tenant is routed to its own database through a dedicated connection
//! pool:
//!
//! - A [`TenantConfigProvider`] resolves a [`TenantId`] to a [`TenantConfig`]
//!   (driver + URL + credentials, or the name of a registered data source).
//! - A [`TenantConnectionRouter`] caches one pool per tenant, builds it on
//!   first use, and drops it again once the provider stops knowing the
//!   tenant.
//! - [`with_tenant`] binds a tenant to the current request so units of work
//!   begun inside it route to that tenant.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_core::pool::{DriverPoolFactory, DriverRegistry};
//! use strata_core::tenant::{StaticConfigProvider, TenantConfig, TenantConnectionRouter};
//!
//! let provider = StaticConfigProvider::from_configs([
//!     TenantConfig::jdbc("acme", "sqlite", "jdbc:sqlite:/srv/acme.db"),
//!     TenantConfig::jndi("globex", "jdbc/globex"),
//! ]);
//! let factory = DriverPoolFactory::new(DriverRegistry::new().with(SqliteDriver::new()));
//! let router = TenantConnectionRouter::new(Arc::new(provider), Arc::new(factory));
//!
//! let pool = router.resolve(&"acme".into()).await?;
//! assert!(Arc::ptr_eq(&pool, &router.resolve(&"acme".into()).await?));
//! ```

mod config;
mod context;
mod provider;
mod router;
pub mod task_local;

pub use config::TenantConfig;
pub use context::{DEFAULT_TENANT_ID, TenantId};
pub use provider::{FindFn, FnConfigProvider, StaticConfigProvider, TenantConfigProvider};
pub use router::{FixedRouting, Stoppable, TenantConnectionRouter, TenantRouting};
pub use task_local::{current_tenant_id, set_sync_tenant, with_tenant, SyncTenantGuard};
