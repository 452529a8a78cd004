//! Pool statistics.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total connections handed out.
    pub connections_acquired: u64,
    /// Total connections given back.
    pub connections_released: u64,
    /// Physical connections opened.
    pub connections_opened: u64,
    /// Checkouts served from the idle queue.
    pub connections_reused: u64,
    /// Idle connections closed for exceeding idle timeout or max lifetime.
    pub connections_expired: u64,
    /// Connections closed because they were broken or failed to reset.
    pub connections_discarded: u64,
    /// Acquisitions that ran out of time.
    pub timeouts: u64,
    /// Connections currently checked out.
    pub in_use: usize,
    /// Idle connections available.
    pub idle: usize,
    /// Total wait time for connections (ms).
    pub total_wait_time_ms: u64,
    /// Maximum wait time observed (ms).
    pub max_wait_time_ms: u64,
    /// Pool creation time.
    pub created_at: Option<Instant>,
    /// Last activity time.
    pub last_activity: Option<Instant>,
}

/// Thread-safe pool statistics.
#[derive(Debug)]
pub(crate) struct AtomicPoolStats {
    acquired: AtomicU64,
    released: AtomicU64,
    opened: AtomicU64,
    reused: AtomicU64,
    expired: AtomicU64,
    discarded: AtomicU64,
    timeouts: AtomicU64,
    in_use: AtomicUsize,
    idle: AtomicUsize,
    total_wait_time_ms: AtomicU64,
    max_wait_time_ms: AtomicU64,
    created_at: Instant,
    last_activity: Mutex<Option<Instant>>,
}

impl AtomicPoolStats {
    pub(crate) fn new() -> Self {
        Self {
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            opened: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            in_use: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
            total_wait_time_ms: AtomicU64::new(0),
            max_wait_time_ms: AtomicU64::new(0),
            created_at: Instant::now(),
            last_activity: Mutex::new(None),
        }
    }

    pub(crate) fn record_acquire(&self, wait_time: Duration) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        self.in_use.fetch_add(1, Ordering::Relaxed);

        let wait_ms = wait_time.as_millis() as u64;
        self.total_wait_time_ms.fetch_add(wait_ms, Ordering::Relaxed);
        self.max_wait_time_ms.fetch_max(wait_ms, Ordering::Relaxed);

        *self.last_activity.lock() = Some(Instant::now());
    }

    pub(crate) fn record_release(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        *self.last_activity.lock() = Some(Instant::now());
    }

    pub(crate) fn record_open(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reuse(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_idle(&self, count: usize) {
        self.idle.store(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            connections_acquired: self.acquired.load(Ordering::Relaxed),
            connections_released: self.released.load(Ordering::Relaxed),
            connections_opened: self.opened.load(Ordering::Relaxed),
            connections_reused: self.reused.load(Ordering::Relaxed),
            connections_expired: self.expired.load(Ordering::Relaxed),
            connections_discarded: self.discarded.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            in_use: self.in_use.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
            total_wait_time_ms: self.total_wait_time_ms.load(Ordering::Relaxed),
            max_wait_time_ms: self.max_wait_time_ms.load(Ordering::Relaxed),
            created_at: Some(self.created_at),
            last_activity: *self.last_activity.lock(),
        }
    }
}
