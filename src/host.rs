//! Traits for the external collaborators the engine calls into, and the
//! argument context handed to the script runtime. Everything behind these
//! traits (entity bookkeeping, streaming, the script VM, the transport) is
//! out of scope for this crate and injected by the host process.

use thiserror::Error;

/// One fully-resolved argument pushed into a native call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallValue {
    /// Integers, hashes, and resolved handles (players, entities, objects).
    Int(u32),
    Float(f32),
    Bool(bool),
    /// Owned for the duration of the call only.
    Str(String),
    /// A handle the callee receives by reference rather than by value
    /// (object-deletion semantics).
    ByRef(u32),
}

/// Argument list and result slot for one native invocation.
#[derive(Debug, Default)]
pub struct CallContext {
    args: Vec<CallValue>,
    result: u32,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: CallValue) {
        self.args.push(value);
    }

    pub fn args(&self) -> &[CallValue] {
        &self.args
    }

    pub fn set_result(&mut self, result: u32) {
        self.result = result;
    }

    pub fn result_u32(&self) -> u32 {
        self.result
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no handler registered for native {0:#018x}")]
    UnknownNative(u64),
    #[error("native execution failed: {0}")]
    Failed(String),
}

/// The script execution environment: resolves a native identity hash to a
/// handler and invokes it with a built argument context.
pub trait ScriptRuntime: Send + Sync {
    fn invoke(&self, native_hash: u64, ctx: &mut CallContext) -> Result<(), InvokeError>;
}

/// Translation between network object ids and live local entities. Either
/// direction may come up empty: an object id can be known before the entity
/// exists locally, and vice versa.
pub trait EntityDirectory: Send + Sync {
    fn entity_for_object(&self, object_id: u32) -> Option<u32>;
    fn object_for_entity(&self, entity: u32) -> Option<u16>;
}

/// Translation from a server-assigned player network id to a local player
/// handle.
pub trait PlayerDirectory: Send + Sync {
    fn player_for_net_id(&self, net_id: u16) -> Option<u32>;
}

/// The streaming/archetype registry. Loads are fire-and-forget; readiness is
/// polled via `is_loaded`, never awaited.
pub trait ModelRegistry: Send + Sync {
    /// Whether the hash names a known model archetype at all.
    fn is_archetype(&self, hash: u32) -> bool;
    fn is_loaded(&self, hash: u32) -> bool;
    fn request_load(&self, hash: u32);
    fn release(&self, hash: u32);
}

/// Outbound reliable-command transport, used only for the old-protocol
/// entity creation acknowledgement.
pub trait ReliableSink: Send + Sync {
    fn send(&self, tag: &str, payload: Vec<u8>);
}
