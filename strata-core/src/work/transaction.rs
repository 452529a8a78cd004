//! Registry of transactional resources bound to execution contexts.
//!
//! While a unit of work is active its connection is bound here under the
//! persistence unit's [`ResourceKey`], so any other transactional code on
//! the same context can find "the current connection" without holding the
//! handle itself.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use super::context::ContextId;
use super::context_map::ContextMap;
use super::handle::SharedConnection;
use crate::error::{StrataError, StrataResult};

/// Key a resource is bound under, usually the persistence unit name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Create a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Default)]
struct ContextState {
    resources: HashMap<ResourceKey, SharedConnection>,
    synchronization: bool,
    actual_transaction: bool,
}

impl ContextState {
    fn is_empty(&self) -> bool {
        self.resources.is_empty() && !self.synchronization && !self.actual_transaction
    }
}

/// Per-context transaction resources and flags.
pub struct TransactionRegistry {
    contexts: ContextMap<ContextState>,
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            contexts: ContextMap::new(),
        }
    }

    fn with_state<R>(&self, context: ContextId, f: impl FnOnce(&mut ContextState) -> R) -> R {
        self.contexts.update(context, |slot| {
            let mut state = slot.take().unwrap_or_default();
            let result = f(&mut state);
            if !state.is_empty() {
                *slot = Some(state);
            }
            result
        })
    }

    /// Bind a connection under `key` for the context.
    pub fn bind_resource(
        &self,
        context: ContextId,
        key: ResourceKey,
        connection: SharedConnection,
    ) -> StrataResult<()> {
        self.with_state(context, |state| {
            if state.resources.contains_key(&key) {
                return Err(StrataError::ResourceAlreadyBound {
                    key: key.to_string(),
                    context,
                });
            }
            trace!(context = %context, key = %key, "Bound transaction resource");
            state.resources.insert(key, connection);
            Ok(())
        })
    }

    /// Remove the binding for `key`, returning the connection if one was bound.
    pub fn unbind_resource(&self, context: ContextId, key: &ResourceKey) -> Option<SharedConnection> {
        self.with_state(context, |state| state.resources.remove(key))
    }

    /// The connection bound under `key` for the context.
    pub fn resource(&self, context: ContextId, key: &ResourceKey) -> Option<SharedConnection> {
        self.with_state(context, |state| state.resources.get(key).cloned())
    }

    /// Check if a connection is bound under `key` for the context.
    pub fn has_resource(&self, context: ContextId, key: &ResourceKey) -> bool {
        self.with_state(context, |state| state.resources.contains_key(key))
    }

    /// The connection bound under `key` for the calling context.
    pub fn current_connection(&self, key: &ResourceKey) -> Option<SharedConnection> {
        self.resource(ContextId::current(), key)
    }

    /// Activate transaction synchronization for the context.
    pub fn init_synchronization(&self, context: ContextId) -> StrataResult<()> {
        self.with_state(context, |state| {
            if state.synchronization {
                return Err(StrataError::SynchronizationActive { context });
            }
            state.synchronization = true;
            Ok(())
        })
    }

    /// Deactivate transaction synchronization for the context.
    pub fn clear_synchronization(&self, context: ContextId) {
        self.with_state(context, |state| state.synchronization = false);
    }

    /// Check if synchronization is active for the context.
    pub fn is_synchronization_active(&self, context: ContextId) -> bool {
        self.with_state(context, |state| state.synchronization)
    }

    /// Mark whether an actual transaction is running on the context.
    pub fn set_actual_transaction_active(&self, context: ContextId, active: bool) {
        self.with_state(context, |state| state.actual_transaction = active);
    }

    /// Check if an actual transaction is running on the context.
    pub fn is_actual_transaction_active(&self, context: ContextId) -> bool {
        self.with_state(context, |state| state.actual_transaction)
    }

    /// Number of contexts holding any resource or flag.
    pub fn active_contexts(&self) -> usize {
        self.contexts.len()
    }
}

impl fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("active_contexts", &self.active_contexts())
            .finish()
    }
}
