//! In-memory drivers and connections for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{StrataError, StrataResult};
use crate::pool::{Connection, ConnectionManager, Driver, Row};
use crate::tenant::TenantConfig;

/// Shared record of what the fake connections did.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    pub statements: Mutex<Vec<String>>,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub auto_commit_off: AtomicUsize,
    pub validations: AtomicUsize,
}

impl Journal {
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

pub(crate) struct MemoryConnection {
    journal: Arc<Journal>,
    auto_commit: bool,
    valid: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, sql: &str) -> StrataResult<u64> {
        if sql.starts_with("FAIL") {
            return Err(StrataError::database(format!("rejected: {sql}")));
        }
        self.journal.statements.lock().push(sql.to_string());
        Ok(1)
    }

    async fn query(&mut self, sql: &str) -> StrataResult<Vec<Row>> {
        self.journal.statements.lock().push(sql.to_string());
        Ok(vec![serde_json::json!({ "ok": 1 })])
    }

    async fn commit(&mut self) -> StrataResult<()> {
        self.journal.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> StrataResult<()> {
        if !self.valid.load(Ordering::SeqCst) {
            return Err(StrataError::database("connection reset by peer"));
        }
        self.journal.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> StrataResult<()> {
        if !enabled {
            self.journal.auto_commit_off.fetch_add(1, Ordering::SeqCst);
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn is_valid(&mut self) -> bool {
        self.journal.validations.fetch_add(1, Ordering::SeqCst);
        self.valid.load(Ordering::SeqCst)
    }
}

/// Opens [`MemoryConnection`]s and counts them.
#[derive(Default)]
pub(crate) struct MemoryManager {
    pub journal: Arc<Journal>,
    pub opened: AtomicUsize,
    pub fail: AtomicBool,
    pub valid: Arc<AtomicBool>,
    pub connect_delay: Option<Duration>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self {
            valid: Arc::new(AtomicBool::new(true)),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            connect_delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionManager for MemoryManager {
    async fn connect(&self) -> StrataResult<Box<dyn Connection>> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StrataError::acquisition("database is unreachable"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            journal: self.journal.clone(),
            auto_commit: true,
            valid: self.valid.clone(),
        }))
    }
}

/// Driver that hands out [`MemoryManager`]s and counts them.
#[derive(Default)]
pub(crate) struct MemoryDriver {
    pub managers: AtomicUsize,
    pub connect_delay: Option<Duration>,
}

impl MemoryDriver {
    pub fn managers(&self) -> usize {
        self.managers.load(Ordering::SeqCst)
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn aliases(&self) -> &[&str] {
        &["mem"]
    }

    fn connection_manager(&self, _config: &TenantConfig) -> StrataResult<Arc<dyn ConnectionManager>> {
        self.managers.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(match self.connect_delay {
            Some(delay) => MemoryManager::with_delay(delay),
            None => MemoryManager::new(),
        }))
    }
}
