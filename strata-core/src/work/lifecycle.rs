//! Process-wide start and stop of a persistence unit.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;

use super::engine::{DEFAULT_TENANT_PROPERTY, PersistenceEngine, Properties};
use crate::error::{StrataError, StrataResult};
use crate::tenant::{DEFAULT_TENANT_ID, Stoppable, TenantId, TenantRouting};

/// Opens and closes the persistence engine.
///
/// `start` and `stop` are serialized with each other; work units read the
/// current engine through a read lock. A stopped unit may be started again.
pub struct PersistenceLifecycle {
    unit: String,
    routing: Arc<dyn TenantRouting>,
    resources: Vec<Arc<dyn Stoppable>>,
    properties: Properties,
    default_tenant: String,
    transition: Mutex<()>,
    engine: RwLock<Option<Arc<PersistenceEngine>>>,
}

impl PersistenceLifecycle {
    /// Create a lifecycle for `unit` that routes through `routing`.
    pub fn new(unit: impl Into<String>, routing: Arc<dyn TenantRouting>) -> Self {
        Self {
            unit: unit.into(),
            routing,
            resources: Vec::new(),
            properties: Properties::new(),
            default_tenant: DEFAULT_TENANT_ID.to_string(),
            transition: Mutex::new(()),
            engine: RwLock::new(None),
        }
    }

    /// Stop `resource` whenever the engine stops.
    pub fn stop_with(mut self, resource: Arc<dyn Stoppable>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Properties every start begins with.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Tenant used when none is bound to the request.
    pub fn default_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.default_tenant = tenant_id.into();
        self
    }

    /// Open the engine.
    ///
    /// `properties` are merged over the construction-time properties.
    pub fn start(&self, properties: Option<Properties>) -> StrataResult<()> {
        let _transition = self.transition.lock();
        if self.engine.read().is_some() {
            return Err(StrataError::AlreadyStarted {
                unit: self.unit.clone(),
            });
        }

        let mut merged = self.properties.clone();
        merged.extend(properties.unwrap_or_default());
        let default_tenant = merged
            .get(DEFAULT_TENANT_PROPERTY)
            .cloned()
            .unwrap_or_else(|| self.default_tenant.clone());

        let engine = PersistenceEngine::new(
            self.unit.clone(),
            self.routing.clone(),
            self.resources.clone(),
            merged,
            TenantId::new(default_tenant),
        );
        info!(
            unit = %self.unit,
            default_tenant = %engine.default_tenant(),
            properties = engine.properties().len(),
            "Persistence unit started"
        );
        *self.engine.write() = Some(Arc::new(engine));
        Ok(())
    }

    /// Close the engine.
    pub fn stop(&self) -> StrataResult<()> {
        let _transition = self.transition.lock();
        let engine = self
            .engine
            .write()
            .take()
            .ok_or_else(|| StrataError::AlreadyStopped {
                unit: self.unit.clone(),
            })?;

        engine.close();
        info!(unit = %self.unit, "Persistence unit stopped");
        Ok(())
    }

    /// The open engine.
    pub fn engine(&self) -> StrataResult<Arc<PersistenceEngine>> {
        self.engine
            .read()
            .clone()
            .ok_or_else(|| StrataError::NotStarted {
                unit: self.unit.clone(),
            })
    }

    /// Check if the engine is open.
    pub fn is_started(&self) -> bool {
        self.engine.read().is_some()
    }

    /// The persistence unit name.
    pub fn unit(&self) -> &str {
        &self.unit
    }
}

impl fmt::Debug for PersistenceLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceLifecycle")
            .field("unit", &self.unit)
            .field("started", &self.is_started())
            .finish()
    }
}
