//! Logging infrastructure for Strata.
//!
//! Structured logging controlled by the `STRATA_DEBUG` environment variable.
//!
//! # Environment Variables
//!
//! - `STRATA_DEBUG=true` - Enable debug logging
//! - `STRATA_DEBUG=1` - Enable debug logging
//! - `STRATA_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `STRATA_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use strata_core::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! Inside Strata the standard tracing macros are used with structured fields:
//!
//! ```rust,ignore
//! debug!(tenant = %tenant_id, "Routing tenant");
//! info!(tenant = %tenant_id, max_connections = 10, "Connection pool created");
//! warn!(handle = %id, error = %e, "Failed to close work unit handle");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `STRATA_DEBUG` environment variable.
///
/// Returns `true` if `STRATA_DEBUG` is set to "true", "1", or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("STRATA_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `STRATA_LOG_LEVEL`.
///
/// Defaults to "debug" if `STRATA_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };

    match env::var("STRATA_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `STRATA_LOG_FORMAT`.
///
/// Defaults to "json".
pub fn get_log_format() -> &'static str {
    env::var("STRATA_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize the Strata logging system.
///
/// Subsequent calls are no-ops. Nothing is installed unless `STRATA_DEBUG`
/// or `STRATA_LOG_LEVEL` is set, so applications that bring their own
/// subscriber are left alone.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("STRATA_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "strata={},strata_core={},strata_sqlite={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match get_log_format() {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(
                    level = level,
                    format = get_log_format(),
                    "Strata logging initialized"
                );
            }
        }
    });
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early, before spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: only called at program startup before threads are spawned.
    unsafe {
        env::set_var("STRATA_LOG_LEVEL", level);
    }
    init();
}

/// Initialize debug logging. Equivalent to `STRATA_DEBUG=true` plus [`init`].
///
/// # Safety
///
/// Same constraints as [`init_with_level`].
pub fn init_debug() {
    // SAFETY: only called at program startup before threads are spawned.
    unsafe {
        env::set_var("STRATA_DEBUG", "true");
    }
    init();
}

/// Debug logging that only fires when `STRATA_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! strata_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace logging that only fires when `STRATA_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! strata_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
