//! Per-tenant connection pools.
//!
//! A [`ConnectionPoolFactory`] turns a tenant's [`TenantConfig`] into a
//! [`ConnectionPool`]. The default [`DriverPoolFactory`] picks a
//! [`ConnectionManager`] either from a [`DataSourceDirectory`] (for
//! `jndi_name`) or from a [`Driver`] registered in a [`DriverRegistry`]
//! (for `jdbc_driver` + `jdbc_url`).
//!
//! ```rust,ignore
//! use strata_core::pool::{DriverPoolFactory, DriverRegistry, PoolSettings};
//! use strata_sqlite::SqliteDriver;
//!
//! let factory = DriverPoolFactory::new(DriverRegistry::new().with(SqliteDriver::new()))
//!     .settings(PoolSettings::builder().max_connections(4).build());
//!
//! let pool = factory.create(&TenantConfig::jdbc("acme", "sqlite", "jdbc:sqlite:acme.db")).await?;
//! let mut conn = pool.acquire().await?;
//! conn.execute("INSERT INTO invoice (total) VALUES (42)").await?;
//! conn.commit().await?;
//! ```
//!
//! [`TenantConfig`]: crate::tenant::TenantConfig

mod connection;
mod driver;
mod factory;
mod settings;
mod source;
mod stats;

pub use connection::{Connection, ConnectionManager, Row};
pub use driver::{DataSourceDirectory, Driver, DriverRegistry};
pub use factory::{ConnectionPoolFactory, DriverPoolFactory};
pub use settings::{PoolSettings, PoolSettingsBuilder};
pub use source::{ConnectionPool, PooledConnection};
pub use stats::PoolStats;
