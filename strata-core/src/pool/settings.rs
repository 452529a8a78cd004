//! Runtime pool settings.

use std::time::Duration;

/// Settings applied to every tenant pool a factory creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum connections checked out at once.
    pub max_connections: usize,
    /// Connections opened by [`warm_up`](super::ConnectionPool::warm_up).
    pub min_idle: usize,
    /// Maximum wait for a connection before acquisition fails.
    pub connection_timeout: Duration,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Option<Duration>,
    /// Connections older than this are closed instead of reused.
    pub max_lifetime: Option<Duration>,
    /// Auto-commit mode forced on every checkout.
    pub auto_commit: bool,
    /// Ping idle connections with [`is_valid`](super::Connection::is_valid)
    /// before handing them out.
    pub test_before_acquire: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_idle: 0,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            auto_commit: false,
            test_before_acquire: true,
        }
    }
}

impl PoolSettings {
    /// Create a builder starting from the defaults.
    pub fn builder() -> PoolSettingsBuilder {
        PoolSettingsBuilder::default()
    }
}

/// Builder for [`PoolSettings`].
#[derive(Debug, Clone, Default)]
pub struct PoolSettingsBuilder {
    settings: PoolSettings,
}

impl PoolSettingsBuilder {
    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: usize) -> Self {
        self.settings.max_connections = n.max(1);
        self
    }

    /// Set the number of connections opened on warm-up.
    pub fn min_idle(mut self, n: usize) -> Self {
        self.settings.min_idle = n;
        self
    }

    /// Set the acquisition timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connection_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.settings.idle_timeout = Some(timeout);
        self
    }

    /// Keep idle connections regardless of how long they sat unused.
    pub fn no_idle_timeout(mut self) -> Self {
        self.settings.idle_timeout = None;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.settings.max_lifetime = Some(lifetime);
        self
    }

    /// Set the auto-commit mode applied at checkout.
    pub fn auto_commit(mut self, enabled: bool) -> Self {
        self.settings.auto_commit = enabled;
        self
    }

    /// Set whether idle connections are validated at checkout.
    pub fn test_before_acquire(mut self, enabled: bool) -> Self {
        self.settings.test_before_acquire = enabled;
        self
    }

    /// Build the settings.
    pub fn build(self) -> PoolSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_auto_commit() {
        let settings = PoolSettings::default();
        assert!(!settings.auto_commit);
        assert!(settings.test_before_acquire);
        assert_eq!(settings.max_connections, 10);
    }

    #[test]
    fn test_builder() {
        let settings = PoolSettings::builder()
            .max_connections(0)
            .min_idle(2)
            .connection_timeout(Duration::from_millis(50))
            .no_idle_timeout()
            .build();

        assert_eq!(settings.max_connections, 1);
        assert_eq!(settings.min_idle, 2);
        assert_eq!(settings.connection_timeout, Duration::from_millis(50));
        assert!(settings.idle_timeout.is_none());
    }
}
