//! SQLite configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SqliteError, SqliteResult};

/// SQLite database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database location.
    pub path: DatabasePath,
    /// Enable foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Synchronous mode.
    pub synchronous: SynchronousMode,
    /// Journal mode.
    pub journal_mode: JournalMode,
}

/// Database location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// Private in-memory database, one per connection.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    /// Printable form of the location.
    pub fn display(&self) -> String {
        match self {
            Self::Memory => ":memory:".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// SQLite synchronous mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SynchronousMode {
    /// Synchronous OFF - Fastest but unsafe.
    Off,
    /// Synchronous NORMAL - Good balance.
    #[default]
    Normal,
    /// Synchronous FULL - Safe but slower.
    Full,
    /// Synchronous EXTRA - Maximum safety.
    Extra,
}

impl SynchronousMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }

    fn parse(value: &str) -> SqliteResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "normal" => Ok(Self::Normal),
            "full" => Ok(Self::Full),
            "extra" => Ok(Self::Extra),
            other => Err(SqliteError::config(format!("unknown synchronous mode '{}'", other))),
        }
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    /// DELETE - Default SQLite mode, deletes journal after transaction.
    Delete,
    /// TRUNCATE - Truncates journal instead of deleting.
    Truncate,
    /// PERSIST - Keep journal file, zero out on commit.
    Persist,
    /// MEMORY - Keep journal in memory.
    Memory,
    /// WAL - Write-Ahead Logging (best for concurrent access).
    #[default]
    Wal,
    /// OFF - No journal.
    Off,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }

    fn parse(value: &str) -> SqliteResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "truncate" => Ok(Self::Truncate),
            "persist" => Ok(Self::Persist),
            "memory" => Ok(Self::Memory),
            "wal" => Ok(Self::Wal),
            "off" => Ok(Self::Off),
            other => Err(SqliteError::config(format!("unknown journal mode '{}'", other))),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            synchronous: SynchronousMode::Normal,
            journal_mode: JournalMode::Wal,
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a SQLite URL into configuration.
    ///
    /// Supported formats:
    /// - `jdbc:sqlite:path/to/db.sqlite` and `jdbc:sqlite::memory:`
    /// - `sqlite::memory:` or `:memory:` - In-memory database
    /// - `sqlite://path/to/db.sqlite` - File-based database
    /// - `sqlite:///absolute/path/db.sqlite` - Absolute path
    /// - `file:path/to/db.sqlite` - Alternative format
    ///
    /// Options follow a `?`: `foreign_keys`, `busy_timeout`, `synchronous`,
    /// and `journal_mode`.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url = url.as_ref().trim();
        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let path = if let Some(path) = location.strip_prefix("sqlite://") {
            path
        } else if let Some(path) = location.strip_prefix("sqlite:") {
            path
        } else if let Some(path) = location.strip_prefix("file:") {
            path
        } else {
            location
        };

        let mut config = match path {
            ":memory:" => Self::memory(),
            "" => return Err(SqliteError::config("database path is required")),
            path => Self::file(path),
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "mode" if value == "memory" => config.path = DatabasePath::Memory,
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "busy_timeout" => {
                    let ms = value.parse().map_err(|_| {
                        SqliteError::config(format!("invalid busy_timeout '{}'", value))
                    })?;
                    config.busy_timeout_ms = Some(ms);
                }
                "synchronous" => config.synchronous = SynchronousMode::parse(value)?,
                "journal_mode" => config.journal_mode = JournalMode::parse(value)?,
                _ => {}
            }
        }

        Ok(config)
    }

    /// Apply the configured pragmas to a freshly opened connection.
    pub(crate) fn apply(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        conn.pragma_update(None, "foreign_keys", self.foreign_keys)?;
        conn.pragma_update(None, "synchronous", self.synchronous.as_pragma())?;

        if let Some(ms) = self.busy_timeout_ms {
            conn.busy_timeout(Duration::from_millis(u64::from(ms)))?;
        }

        // in-memory databases only support MEMORY and OFF
        if !self.path.is_memory() {
            conn.pragma_update_and_check(
                None,
                "journal_mode",
                self.journal_mode.as_pragma(),
                |row| row.get::<_, String>(0),
            )?;
        }
        Ok(())
    }

    /// Enable or disable foreign keys.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout in milliseconds.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    /// Set the synchronous mode.
    pub fn synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }

    /// Set the journal mode.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}
