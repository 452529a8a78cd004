//! # Strata
//!
//! Multi-tenant data access for Rust.
//!
//! Strata provides:
//! - One connection pool per tenant, created on first use and dropped when the
//!   tenant disappears
//! - Units of work bound to the current request, with guaranteed cleanup
//! - A persistence lifecycle that starts and stops once per process run
//! - Configuration from `strata.toml` with environment overrides
//! - A SQLite driver (feature `sqlite`, enabled by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::Error> {
//!     let config = StrataConfig::from_file("strata.toml")?;
//!     let service = PersistenceService::from_config(
//!         &config,
//!         DriverRegistry::new().with(SqliteDriver::new()),
//!     )?;
//!     service.start(None)?;
//!
//!     let rows = with_tenant("acme", service.run(async {
//!         let handle = service.get().await?;
//!         handle.query("SELECT id, total FROM invoice").await
//!     }))
//!     .await?;
//!
//!     service.stop()?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub use strata_core::{config, error, logging, pool, service, tenant, work};

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use strata_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use strata_core::prelude::*;

    #[cfg(feature = "sqlite")]
    pub use strata_sqlite::SqliteDriver;
}

// Re-export key types at the crate root
pub use strata_core::{
    PersistenceService, StrataConfig, StrataError as Error, StrataResult, TenantConfig,
};
