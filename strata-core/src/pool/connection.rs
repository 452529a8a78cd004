//! Physical connection interfaces implemented by drivers.

use async_trait::async_trait;

use crate::error::StrataResult;

/// A result row, keyed by column name.
pub type Row = serde_json::Value;

/// One physical database connection.
///
/// Pools drive the transaction mode through [`set_auto_commit`]; with
/// auto-commit off, statements accumulate in an open transaction until
/// [`commit`] or [`rollback`].
///
/// [`set_auto_commit`]: Connection::set_auto_commit
/// [`commit`]: Connection::commit
/// [`rollback`]: Connection::rollback
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str) -> StrataResult<u64>;

    /// Execute a query and return all rows as JSON objects.
    async fn query(&mut self, sql: &str) -> StrataResult<Vec<Row>>;

    /// Commit the current transaction, if any.
    async fn commit(&mut self) -> StrataResult<()>;

    /// Roll back the current transaction, if any.
    async fn rollback(&mut self) -> StrataResult<()>;

    /// Switch auto-commit mode.
    async fn set_auto_commit(&mut self, enabled: bool) -> StrataResult<()>;

    /// Current auto-commit mode.
    fn auto_commit(&self) -> bool;

    /// Check that the connection is still usable.
    async fn is_valid(&mut self) -> bool;

    /// Return the connection to a clean state before reuse.
    async fn reset(&mut self) -> StrataResult<()> {
        self.rollback().await
    }
}

/// Opens physical connections for one data source.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> StrataResult<Box<dyn Connection>>;
}
