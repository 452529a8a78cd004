//! Sharded per-context storage.

use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};

use parking_lot::Mutex;

use super::context::ContextId;

/// A map keyed by [`ContextId`], split into independently locked shards so
/// unrelated contexts rarely contend.
pub(crate) struct ContextMap<V> {
    shards: Box<[Mutex<HashMap<ContextId, V>>]>,
    hasher: RandomState,
}

impl<V> ContextMap<V> {
    /// Create with one shard per CPU, at least four.
    pub(crate) fn new() -> Self {
        Self::with_shards(num_cpus::get().max(4))
    }

    pub(crate) fn with_shards(count: usize) -> Self {
        let shards = (0..count.next_power_of_two())
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, context: ContextId) -> &Mutex<HashMap<ContextId, V>> {
        let mask = self.shards.len() - 1;
        &self.shards[(self.hasher.hash_one(context) as usize) & mask]
    }

    /// Insert unless the context already has a value; hands the value back
    /// if it does.
    pub(crate) fn try_insert(&self, context: ContextId, value: V) -> Result<(), V> {
        let mut shard = self.shard(context).lock();
        if shard.contains_key(&context) {
            return Err(value);
        }
        shard.insert(context, value);
        Ok(())
    }

    pub(crate) fn remove(&self, context: ContextId) -> Option<V> {
        self.shard(context).lock().remove(&context)
    }

    pub(crate) fn contains(&self, context: ContextId) -> bool {
        self.shard(context).lock().contains_key(&context)
    }

    /// Run `f` on the context's slot. A slot left as `None` is removed.
    pub(crate) fn update<R>(&self, context: ContextId, f: impl FnOnce(&mut Option<V>) -> R) -> R {
        let mut shard = self.shard(context).lock();
        let mut slot = shard.remove(&context);
        let result = f(&mut slot);
        if let Some(value) = slot {
            shard.insert(context, value);
        }
        result
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }
}

impl<V: Clone> ContextMap<V> {
    pub(crate) fn get(&self, context: ContextId) -> Option<V> {
        self.shard(context).lock().get(&context).cloned()
    }
}
