//! Error types for tenant routing, pooling, and unit-of-work management.
//!
//! Every failure in this crate surfaces as a [`StrataError`]. Each variant
//! carries a stable [`ErrorCode`] so callers can branch on the category of
//! failure without matching on message text.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: Configuration errors (invalid tenant config, unknown driver, bad TOML)
//! - 2xxx: Usage errors (double begin, start/stop out of order)
//! - 3xxx: Acquisition errors (pool exhausted, timeout, connect failure)
//! - 4xxx: Not-found errors (unknown tenant)
//! - 5xxx: Database errors reported by a driver
//! - 9xxx: Internal errors
//!
//! ```rust
//! use strata_core::{ErrorCode, StrataError};
//!
//! let err = StrataError::tenant_not_found("ghost");
//! assert_eq!(err.code(), ErrorCode::TenantNotFound);
//! assert_eq!(err.code().code(), "S4001");
//! assert!(err.is_not_found());
//! assert!(!err.is_retryable());
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::work::ContextId;

/// Result type for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

/// Boxed error used as the cause of acquisition and database failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Configuration errors (1xxx)
    /// Tenant configuration failed validation (S1001).
    InvalidTenantConfig = 1001,
    /// No driver registered under the configured name (S1002).
    UnknownDriver = 1002,
    /// No named data source registered under the configured name (S1003).
    UnknownDataSource = 1003,
    /// Invalid configuration file or value (S1004).
    InvalidConfiguration = 1004,
    /// Missing environment variable referenced by configuration (S1005).
    MissingEnvironment = 1005,

    // Usage errors (2xxx)
    /// Work already begun on this context (S2001).
    DoubleBegin = 2001,
    /// Persistence engine already started (S2002).
    AlreadyStarted = 2002,
    /// Persistence engine already stopped (S2003).
    AlreadyStopped = 2003,
    /// Persistence engine not started (S2004).
    NotStarted = 2004,
    /// Handle requested outside a unit of work (S2005).
    NoActiveWork = 2005,
    /// Resource already bound to this context (S2006).
    ResourceAlreadyBound = 2006,
    /// Transaction synchronization already active (S2007).
    SynchronizationActive = 2007,
    /// Work unit handle already closed (S2008).
    HandleClosed = 2008,

    // Acquisition errors (3xxx)
    /// Connection could not be acquired (S3001).
    AcquisitionFailed = 3001,

    // Not-found errors (4xxx)
    /// Tenant could not be resolved (S4001).
    TenantNotFound = 4001,

    // Database errors (5xxx)
    /// Error reported by the database driver (S5001).
    DatabaseError = 5001,

    // Internal errors (9xxx)
    /// I/O failure (S9001).
    Io = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S4001").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidTenantConfig => "Invalid tenant configuration",
            Self::UnknownDriver => "Unknown database driver",
            Self::UnknownDataSource => "Unknown named data source",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::MissingEnvironment => "Missing environment variable",
            Self::DoubleBegin => "Work already begun",
            Self::AlreadyStarted => "Persistence engine already started",
            Self::AlreadyStopped => "Persistence engine already stopped",
            Self::NotStarted => "Persistence engine not started",
            Self::NoActiveWork => "No active unit of work",
            Self::ResourceAlreadyBound => "Resource already bound",
            Self::SynchronizationActive => "Synchronization already active",
            Self::HandleClosed => "Handle closed",
            Self::AcquisitionFailed => "Connection acquisition failed",
            Self::TenantNotFound => "Tenant not found",
            Self::DatabaseError => "Database error",
            Self::Io => "I/O error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by tenant routing, pooling, and unit-of-work management.
#[derive(Error, Debug)]
pub enum StrataError {
    /// The tenant config provider does not know this tenant.
    #[error("No such tenant found: {tenant_id}")]
    TenantNotFound {
        /// The tenant that could not be resolved.
        tenant_id: String,
    },

    /// The tenant's configuration violates the jndi/jdbc invariant.
    #[error("Invalid config for tenant '{tenant_id}': {reason}")]
    InvalidTenantConfig {
        /// The tenant whose config is invalid.
        tenant_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No driver is registered for the tenant's `jdbc_driver`.
    #[error("Unknown driver '{driver}' for tenant '{tenant_id}'")]
    UnknownDriver {
        /// The tenant whose config names the driver.
        tenant_id: String,
        /// The unregistered driver name.
        driver: String,
    },

    /// No data source is registered under the tenant's `jndi_name`.
    #[error("Unknown data source '{name}' for tenant '{tenant_id}'")]
    UnknownDataSource {
        /// The tenant whose config names the data source.
        tenant_id: String,
        /// The unregistered data source name.
        name: String,
    },

    /// `begin()` was called on a context that already has a handle.
    #[error(
        "Work already begun on context {context}. Looks like begin() was called twice \
         without a balancing call to end() in between"
    )]
    DoubleBegin {
        /// The context holding the existing handle.
        context: ContextId,
    },

    /// `get()` was called on an idle context with auto-begin disabled.
    #[error("Requested handle outside a unit of work on context {context}; call begin() first")]
    NoActiveWork {
        /// The idle context.
        context: ContextId,
    },

    /// `start()` was called while an engine is open.
    #[error("Persistence unit '{unit}' was already started")]
    AlreadyStarted {
        /// The persistence unit name.
        unit: String,
    },

    /// `stop()` was called with no open engine.
    #[error("Persistence unit '{unit}' was already shut down")]
    AlreadyStopped {
        /// The persistence unit name.
        unit: String,
    },

    /// Work was requested before `start()`.
    #[error("Persistence unit '{unit}' has not been started")]
    NotStarted {
        /// The persistence unit name.
        unit: String,
    },

    /// A transaction resource is already bound for this key on this context.
    #[error("Resource '{key}' is already bound to context {context}")]
    ResourceAlreadyBound {
        /// The resource key.
        key: String,
        /// The context that holds the binding.
        context: ContextId,
    },

    /// Transaction synchronization was initialized twice on one context.
    #[error("Transaction synchronization is already active on context {context}")]
    SynchronizationActive {
        /// The context with active synchronization.
        context: ContextId,
    },

    /// The work unit handle was already closed.
    #[error("Work unit handle {handle} is closed")]
    HandleClosed {
        /// The handle id.
        handle: String,
    },

    /// A connection could not be acquired.
    #[error("Connection acquisition failed: {message}")]
    Acquisition {
        /// What failed.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The driver reported an error while using a connection.
    #[error("Database error: {message}")]
    Database {
        /// The driver's message.
        message: String,
        /// The underlying driver error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file is not valid TOML for [`crate::StrataConfig`].
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Environment variable referenced by configuration is not set.
    #[error("Environment variable not found: {0}")]
    EnvNotFound(String),

    /// The configuration file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl StrataError {
    /// Create a tenant-not-found error.
    pub fn tenant_not_found(tenant_id: impl Into<String>) -> Self {
        Self::TenantNotFound {
            tenant_id: tenant_id.into(),
        }
    }

    /// Create an invalid tenant config error.
    pub fn invalid_tenant_config(tenant_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTenantConfig {
            tenant_id: tenant_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an acquisition error without an underlying cause.
    pub fn acquisition(message: impl Into<String>) -> Self {
        Self::Acquisition {
            message: message.into(),
            source: None,
        }
    }

    /// Create an acquisition error wrapping an underlying cause.
    pub fn acquisition_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Acquisition {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an acquisition timeout error.
    pub fn acquisition_timeout(tenant_id: &str, waited: Duration) -> Self {
        Self::acquisition(format!(
            "timed out after {}ms waiting for a connection for tenant '{}'",
            waited.as_millis(),
            tenant_id
        ))
    }

    /// Create a database error without an underlying cause.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error wrapping a driver error.
    pub fn database_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TenantNotFound { .. } => ErrorCode::TenantNotFound,
            Self::InvalidTenantConfig { .. } => ErrorCode::InvalidTenantConfig,
            Self::UnknownDriver { .. } => ErrorCode::UnknownDriver,
            Self::UnknownDataSource { .. } => ErrorCode::UnknownDataSource,
            Self::DoubleBegin { .. } => ErrorCode::DoubleBegin,
            Self::NoActiveWork { .. } => ErrorCode::NoActiveWork,
            Self::AlreadyStarted { .. } => ErrorCode::AlreadyStarted,
            Self::AlreadyStopped { .. } => ErrorCode::AlreadyStopped,
            Self::NotStarted { .. } => ErrorCode::NotStarted,
            Self::ResourceAlreadyBound { .. } => ErrorCode::ResourceAlreadyBound,
            Self::SynchronizationActive { .. } => ErrorCode::SynchronizationActive,
            Self::HandleClosed { .. } => ErrorCode::HandleClosed,
            Self::Acquisition { .. } => ErrorCode::AcquisitionFailed,
            Self::Database { .. } => ErrorCode::DatabaseError,
            Self::Config(_) | Self::Toml(_) => ErrorCode::InvalidConfiguration,
            Self::EnvNotFound(_) => ErrorCode::MissingEnvironment,
            Self::Io { .. } => ErrorCode::Io,
        }
    }

    /// Check if this is a configuration error (category 1xxx).
    pub fn is_config_error(&self) -> bool {
        (1000..2000).contains(&(self.code() as u16))
    }

    /// Check if this is a usage error (category 2xxx).
    ///
    /// Usage errors are precondition failures; retrying them never helps.
    pub fn is_usage_error(&self) -> bool {
        (2000..3000).contains(&(self.code() as u16))
    }

    /// Check if this is a connection acquisition error.
    pub fn is_acquisition_error(&self) -> bool {
        matches!(self, Self::Acquisition { .. })
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TenantNotFound { .. })
    }

    /// Check if the caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        self.is_acquisition_error()
    }
}
