//! Units of work and the persistence lifecycle.
//!
//! - [`PersistenceLifecycle`] starts and stops the [`PersistenceEngine`] of a
//!   persistence unit, once per process run.
//! - [`UnitOfWork`] binds at most one [`WorkUnitHandle`] to each execution
//!   context ([`ContextId`]) between `begin()` and `end()`.
//! - [`TransactionRegistry`] exposes the active connection of a context to
//!   other transactional code.
//! - [`with_unit_of_work`] and [`WorkUnitGuard`] guarantee `end()` runs.

mod context;
mod context_map;
mod engine;
mod handle;
mod lifecycle;
mod manager;
mod scope;
mod transaction;

pub use context::{ContextId, in_work_context, sync_work_context, with_work_context};
pub use engine::{DEFAULT_TENANT_PROPERTY, PersistenceEngine, Properties};
pub use handle::{SharedConnection, WorkUnitHandle};
pub use lifecycle::PersistenceLifecycle;
pub use manager::UnitOfWork;
pub use scope::{WorkUnitGuard, with_unit_of_work};
pub use transaction::{ResourceKey, TransactionRegistry};
