//! The opened persistence engine for one persistence unit.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::context::ContextId;
use super::handle::WorkUnitHandle;
use crate::error::StrataResult;
use crate::tenant::{Stoppable, TenantId, TenantRouting};

/// String properties a persistence unit is started with.
pub type Properties = BTreeMap<String, String>;

/// Start property overriding the tenant used when none is bound.
pub const DEFAULT_TENANT_PROPERTY: &str = "strata.default_tenant";

/// A started persistence unit. Opens work unit handles until closed.
pub struct PersistenceEngine {
    unit: String,
    routing: Arc<dyn TenantRouting>,
    resources: Vec<Arc<dyn Stoppable>>,
    properties: Properties,
    default_tenant: TenantId,
    started_at: Instant,
}

impl PersistenceEngine {
    pub(crate) fn new(
        unit: impl Into<String>,
        routing: Arc<dyn TenantRouting>,
        resources: Vec<Arc<dyn Stoppable>>,
        properties: Properties,
        default_tenant: TenantId,
    ) -> Self {
        Self {
            unit: unit.into(),
            routing,
            resources,
            properties,
            default_tenant,
            started_at: Instant::now(),
        }
    }

    /// Open a handle on a connection from the tenant's pool.
    pub async fn open_handle(
        &self,
        tenant_id: TenantId,
        context: ContextId,
    ) -> StrataResult<WorkUnitHandle> {
        let pool = self.routing.route(&tenant_id).await?;
        let conn = pool.acquire().await?;
        let handle = WorkUnitHandle::new(tenant_id, context, self.unit.clone(), conn);
        debug!(
            unit = %self.unit,
            tenant = %handle.tenant_id(),
            context = %context,
            handle = %handle.id(),
            "Opened work unit handle"
        );
        Ok(handle)
    }

    /// Stop every resource the engine holds.
    pub fn close(&self) {
        for resource in &self.resources {
            resource.stop();
        }
    }

    /// The persistence unit name.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The merged start properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Look up one start property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The tenant used when no tenant is bound to the request.
    pub fn default_tenant(&self) -> &TenantId {
        &self.default_tenant
    }

    /// When the engine was started.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

impl fmt::Debug for PersistenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceEngine")
            .field("unit", &self.unit)
            .field("properties", &self.properties)
            .field("default_tenant", &self.default_tenant)
            .finish()
    }
}
