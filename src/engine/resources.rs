//! Resource bookkeeping: each script resource owns a deferred queue, and
//! inbound commands address resources by name hash.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::engine::queue::TickQueue;

/// The sandbox a deferred unit executes against. Activation brackets unit
/// execution so side effects are attributed to the right resource.
pub trait ResourceHandle: Send + Sync {
    fn name(&self) -> &str;
    fn activate(&self);
    fn deactivate(&self);
}

/// Case-insensitive Jenkins one-at-a-time hash, the identity under which
/// resources are addressed on the wire.
pub fn resource_hash(name: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in name.bytes() {
        hash = hash.wrapping_add(byte.to_ascii_lowercase() as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// A registered resource paired with its deferred queue.
pub struct ResourceRpc {
    resource: Arc<dyn ResourceHandle>,
    queue: TickQueue,
}

impl ResourceRpc {
    pub fn resource(&self) -> &Arc<dyn ResourceHandle> {
        &self.resource
    }

    pub fn queue(&self) -> &TickQueue {
        &self.queue
    }

    /// Drain this resource's queue once; called from the frame loop during
    /// the resource's tick.
    pub fn tick(&self) -> usize {
        self.queue.drain(&*self.resource)
    }
}

/// All resources known to the engine, keyed by name hash.
#[derive(Default)]
pub struct ResourceRegistry {
    by_hash: RwLock<HashMap<u32, Arc<ResourceRpc>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fresh queue to the resource and make it addressable.
    /// Returns the name hash commands will use for it.
    pub fn register(&self, resource: Arc<dyn ResourceHandle>) -> u32 {
        let hash = resource_hash(resource.name());
        debug!(target: "rpc", "registered resource {} ({:#010x})", resource.name(), hash);
        self.by_hash.write().unwrap().insert(
            hash,
            Arc::new(ResourceRpc {
                resource,
                queue: TickQueue::new(),
            }),
        );
        hash
    }

    /// Drop a resource and whatever is still queued against it.
    pub fn remove(&self, name: &str) -> Option<Arc<ResourceRpc>> {
        self.by_hash.write().unwrap().remove(&resource_hash(name))
    }

    pub fn lookup(&self, hash: u32) -> Option<Arc<ResourceRpc>> {
        self.by_hash.read().unwrap().get(&hash).cloned()
    }

    /// Drain every resource's queue once. Ordering across resources is
    /// unspecified.
    pub fn tick_all(&self) -> usize {
        let entries: Vec<Arc<ResourceRpc>> =
            self.by_hash.read().unwrap().values().cloned().collect();
        entries.iter().map(|entry| entry.tick()).sum()
    }

    /// Total units still queued across all resources.
    pub fn pending(&self) -> usize {
        self.by_hash
            .read()
            .unwrap()
            .values()
            .map(|entry| entry.queue().len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_hash_is_case_insensitive() {
        assert_eq!(resource_hash("MyResource"), resource_hash("myresource"));
        assert_ne!(resource_hash("alpha"), resource_hash("beta"));
    }
}
