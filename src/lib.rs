//! Client-side deferred replay of server-issued native RPC commands.
//!
//! The server sends binary commands naming a native function, a target
//! resource, and a schema-typed argument list. Arguments may reference
//! things that don't exist yet on this client (entities known only by a
//! creation token, models not yet streamed in), so each command becomes a
//! deferred unit: its preconditions are gathered once at receipt time, and
//! the call itself runs on the frame thread during the target resource's
//! tick, once every precondition holds.

pub mod engine;
pub mod error;
pub mod host;
pub mod protocol;
pub mod schema;
pub mod wire;

pub use engine::objects::ObjectHandles;
pub use engine::queue::{DeferredUnit, TickQueue};
pub use engine::resources::{resource_hash, ResourceHandle, ResourceRegistry, ResourceRpc};
pub use engine::tokens::CreationTokens;
pub use engine::{EngineSettings, HostServices, RpcEngine};
pub use error::RpcError;
pub use host::{
    CallContext, CallValue, EntityDirectory, InvokeError, ModelRegistry, PlayerDirectory,
    ReliableSink, ScriptRuntime,
};
pub use protocol::ProtocolVersion;
pub use schema::{ArgumentType, CatalogError, NativeDescriptor, RpcCatalog, RpcKind};
pub use wire::{WireError, WireReader, WireWriter};
