//! Error types for SQLite operations.

use strata_core::StrataError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite reported an error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The background connection thread is gone or failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The database URL or options are invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

impl From<tokio_rusqlite::Error> for SqliteError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => Self::Sqlite(e),
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<SqliteError> for StrataError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Config(msg) => StrataError::config(msg),
            other => StrataError::database_with(other.to_string(), other),
        }
    }
}
