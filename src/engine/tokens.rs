//! The creation token table: client-minted tokens standing in for entities
//! the server has not confirmed yet, mapped both ways once the creation
//! completes.
//!
//! Writers race: the frame thread registers mappings when creation natives
//! finish, while the network thread registers them when the server announces
//! one. The table is lock-protected for that reason.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Bit 31 of an entity argument marks a forward reference; the low 31 bits
/// hold the creation token.
pub const FORWARD_REF_BIT: u32 = 0x8000_0000;

pub fn is_forward_ref(value: u32) -> bool {
    value & FORWARD_REF_BIT != 0
}

pub fn forward_ref(token: u32) -> u32 {
    FORWARD_REF_BIT | token
}

pub fn token_of(value: u32) -> u32 {
    value & !FORWARD_REF_BIT
}

/// Object ids are stored with bit 16 set so that "mapping exists for object
/// id 0" and "no mapping" stay distinguishable.
pub fn tag_object_id(raw: u16) -> u32 {
    (1 << 16) | raw as u32
}

struct Entry {
    object_id: u32,
    registered_at: Instant,
}

struct Inner {
    by_token: HashMap<u32, Entry>,
    by_object: HashMap<u32, u32>,
}

/// Bidirectional `token <-> object id` mapping.
pub struct CreationTokens {
    inner: Mutex<Inner>,
}

impl Default for CreationTokens {
    fn default() -> Self {
        Self::new()
    }
}

impl CreationTokens {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_token: HashMap::new(),
                by_object: HashMap::new(),
            }),
        }
    }

    /// Install both directions of the mapping. Called exactly once per
    /// completed creation; a second registration for the same token keeps
    /// the original mapping and is logged.
    pub fn register(&self, token: u32, raw_object_id: u16) {
        let object_id = tag_object_id(raw_object_id);
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.by_token.get(&token) {
            if existing.object_id != object_id {
                warn!(
                    target: "rpc",
                    "creation token {} already mapped to object {:#x}, ignoring {:#x}",
                    token, existing.object_id, object_id
                );
            }
            return;
        }
        debug!(target: "rpc", "creation token {} -> object {:#x}", token, object_id);
        inner.by_token.insert(
            token,
            Entry {
                object_id,
                registered_at: Instant::now(),
            },
        );
        inner.by_object.insert(object_id, token);
    }

    /// `None` means "not ready yet", not failure.
    pub fn resolve(&self, token: u32) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .by_token
            .get(&token)
            .map(|e| e.object_id)
    }

    pub fn token_for_object(&self, raw_object_id: u16) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .by_object
            .get(&tag_object_id(raw_object_id))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop mappings older than `max_age`, returning how many were removed.
    /// Nothing calls this implicitly; hosts that care about table growth run
    /// it from their frame loop.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<u32> = inner
            .by_token
            .iter()
            .filter(|(_, e)| now.duration_since(e.registered_at) >= max_age)
            .map(|(token, _)| *token)
            .collect();
        for token in &expired {
            if let Some(entry) = inner.by_token.remove(token) {
                inner.by_object.remove(&entry.object_id);
            }
        }
        expired.len()
    }
}
