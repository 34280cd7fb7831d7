//! The object handle table: server-assigned indices mapped to locally
//! resolved object handles. Populated when object-create natives finish,
//! consumed by obj_ref/obj_del arguments of later commands.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

#[derive(Default)]
pub struct ObjectHandles {
    map: Mutex<HashMap<u32, u32>>,
}

impl ObjectHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, index: u32, handle: u32) {
        debug!(target: "rpc", "object {} -> handle {:#x}", index, handle);
        self.map.lock().unwrap().insert(index, handle);
    }

    pub fn get(&self, index: u32) -> Option<u32> {
        self.map.lock().unwrap().get(&index).copied()
    }

    pub fn remove(&self, index: u32) -> Option<u32> {
        self.map.lock().unwrap().remove(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_get() {
        let objects = ObjectHandles::new();
        assert_eq!(objects.get(3), None);
        objects.store(3, 0xCAFE);
        assert_eq!(objects.get(3), Some(0xCAFE));
        assert_eq!(objects.remove(3), Some(0xCAFE));
        assert_eq!(objects.get(3), None);
    }
}
