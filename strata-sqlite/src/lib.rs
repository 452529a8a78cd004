//! SQLite driver for Strata.
//!
//! This crate lets tenant pools open SQLite databases, using
//! `tokio-rusqlite` for asynchronous access.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_core::{DriverRegistry, PersistenceService, StrataConfig};
//! use strata_sqlite::SqliteDriver;
//!
//! let config = StrataConfig::from_file("strata.toml")?;
//! let service = PersistenceService::from_config(
//!     &config,
//!     DriverRegistry::new().with(SqliteDriver::new()),
//! )?;
//! ```
//!
//! A tenant then points at its database file:
//!
//! ```toml
//! [[tenants]]
//! id = "acme"
//! jdbc_driver = "sqlite"
//! jdbc_url = "jdbc:sqlite:/var/lib/strata/acme.db"
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig, SynchronousMode};
pub use connection::{SqliteConnection, SqliteConnectionManager};
pub use driver::SqliteDriver;
pub use error::{SqliteError, SqliteResult};
