//! SQLite connections and the connection manager.

use async_trait::async_trait;
use strata_core::{Connection, ConnectionManager, Row, StrataError, StrataResult};
use tracing::{debug, trace};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types::row_to_json;

/// A SQLite connection driven on a background thread.
///
/// With auto-commit off, a transaction is opened before the first statement
/// and stays open until [`commit`](Connection::commit) or
/// [`rollback`](Connection::rollback).
pub struct SqliteConnection {
    conn: tokio_rusqlite::Connection,
    auto_commit: bool,
}

impl SqliteConnection {
    /// Open a connection and apply the configured pragmas.
    pub async fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => tokio_rusqlite::Connection::open_in_memory().await?,
            DatabasePath::File(path) => tokio_rusqlite::Connection::open(path).await?,
        };

        let settings = config.clone();
        conn.call(move |conn| Ok(settings.apply(conn)?)).await?;

        debug!(path = %config.path.display(), "SQLite connection opened");
        Ok(Self {
            conn,
            auto_commit: true,
        })
    }

    /// Check if a transaction is open on the connection.
    pub async fn in_transaction(&self) -> SqliteResult<bool> {
        Ok(self.conn.call(|conn| Ok(!conn.is_autocommit())).await?)
    }

    /// Execute multiple statements in a batch.
    pub async fn execute_batch(&mut self, sql: &str) -> StrataResult<()> {
        let sql = sql.to_string();
        let begin = !self.auto_commit;
        debug!(sql = %sql, "Executing batch");

        self.conn
            .call(move |conn| {
                begin_if_needed(conn, begin)?;
                Ok(conn.execute_batch(&sql)?)
            })
            .await
            .map_err(|e| SqliteError::from(e).into())
    }

    async fn end_transaction(&mut self, statement: &'static str) -> StrataResult<()> {
        trace!(statement, "Ending SQLite transaction");
        self.conn
            .call(move |conn| {
                if !conn.is_autocommit() {
                    conn.execute_batch(statement)?;
                }
                Ok(())
            })
            .await
            .map_err(|e| SqliteError::from(e).into())
    }
}

fn begin_if_needed(conn: &rusqlite::Connection, begin: bool) -> rusqlite::Result<()> {
    if begin && conn.is_autocommit() {
        conn.execute_batch("BEGIN")?;
    }
    Ok(())
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn execute(&mut self, sql: &str) -> StrataResult<u64> {
        let sql = sql.to_string();
        let begin = !self.auto_commit;
        debug!(sql = %sql, "Executing statement");

        self.conn
            .call(move |conn| {
                begin_if_needed(conn, begin)?;
                Ok(conn.execute(&sql, [])? as u64)
            })
            .await
            .map_err(|e| SqliteError::from(e).into())
    }

    async fn query(&mut self, sql: &str) -> StrataResult<Vec<Row>> {
        let sql = sql.to_string();
        let begin = !self.auto_commit;
        debug!(sql = %sql, "Executing query");

        self.conn
            .call(move |conn| {
                begin_if_needed(conn, begin)?;
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> = stmt
                    .column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();

                let rows = stmt.query_map([], |row| Ok(row_to_json(row, &columns)))?;
                let results: Result<Vec<_>, _> = rows.collect();
                Ok(results?)
            })
            .await
            .map_err(|e| SqliteError::from(e).into())
    }

    async fn commit(&mut self) -> StrataResult<()> {
        self.end_transaction("COMMIT").await
    }

    async fn rollback(&mut self) -> StrataResult<()> {
        self.end_transaction("ROLLBACK").await
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> StrataResult<()> {
        if enabled && !self.auto_commit {
            self.commit().await?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn is_valid(&mut self) -> bool {
        self.conn
            .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
            .await
            .is_ok()
    }
}

/// Opens [`SqliteConnection`]s for one database.
#[derive(Debug, Clone)]
pub struct SqliteConnectionManager {
    config: SqliteConfig,
}

impl SqliteConnectionManager {
    /// Create a manager for the configured database.
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    /// The database configuration.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionManager for SqliteConnectionManager {
    async fn connect(&self) -> StrataResult<Box<dyn Connection>> {
        let conn = SqliteConnection::open(&self.config).await.map_err(|e| {
            StrataError::acquisition_with(
                format!("failed to open SQLite database {}", self.config.path.display()),
                e,
            )
        })?;
        Ok(Box::new(conn))
    }
}
