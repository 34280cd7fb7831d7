//! The RPC engine: receives reliable commands from the network layer,
//! gathers execution preconditions (Pass 1), and queues deferred units
//! against the target resource's frame-synchronous queue.

mod executor;
pub mod objects;
pub mod queue;
pub mod resources;
pub mod tokens;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::RpcError;
use crate::host::{EntityDirectory, ModelRegistry, PlayerDirectory, ReliableSink, ScriptRuntime};
use crate::protocol::{ProtocolVersion, MSG_RPC_ENTITY_CREATION, MSG_RPC_NATIVE};
use crate::schema::{ArgumentType, RpcCatalog, RpcKind};
use crate::wire::WireReader;

use executor::ExecutionPlan;
use objects::ObjectHandles;
use queue::DeferredUnit;
use resources::ResourceRegistry;
use tokens::CreationTokens;

/// Tunables loaded alongside the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSettings {
    /// Whether cleanup callbacks (model releases) run when the native itself
    /// fails. Off by default: a model that fed a failed creation is kept
    /// pinned rather than released mid-failure.
    #[serde(default)]
    pub release_assets_on_failure: bool,

    /// Age after which creation-token mappings may be swept. `None` keeps
    /// them for the process lifetime.
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,
}

/// The host-provided collaborators the engine executes against.
pub struct HostServices {
    pub runtime: Arc<dyn ScriptRuntime>,
    pub entities: Arc<dyn EntityDirectory>,
    pub players: Arc<dyn PlayerDirectory>,
    pub models: Arc<dyn ModelRegistry>,
    pub net: Arc<dyn ReliableSink>,
}

pub struct RpcEngine {
    catalog: Arc<RpcCatalog>,
    protocol: ProtocolVersion,
    settings: EngineSettings,
    services: HostServices,
    resources: Arc<ResourceRegistry>,
    tokens: Arc<CreationTokens>,
    objects: Arc<ObjectHandles>,
}

impl RpcEngine {
    pub fn new(
        catalog: Arc<RpcCatalog>,
        protocol: ProtocolVersion,
        settings: EngineSettings,
        services: HostServices,
    ) -> Self {
        Self {
            catalog,
            protocol,
            settings,
            services,
            resources: Arc::new(ResourceRegistry::new()),
            tokens: Arc::new(CreationTokens::new()),
            objects: Arc::new(ObjectHandles::new()),
        }
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    pub fn tokens(&self) -> &Arc<CreationTokens> {
        &self.tokens
    }

    pub fn objects(&self) -> &Arc<ObjectHandles> {
        &self.objects
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Entry point for the network delivery thread. Malformed or
    /// unroutable commands are dropped here; the error is for the caller's
    /// diagnostics only and requires no action.
    pub fn handle_command(&self, tag: &str, payload: &[u8]) -> Result<(), RpcError> {
        match tag {
            MSG_RPC_ENTITY_CREATION => self.handle_entity_creation(payload),
            MSG_RPC_NATIVE => self.handle_native_rpc(payload),
            other => Err(RpcError::UnknownCommand(other.to_string())),
        }
    }

    /// Apply the configured token TTL, if any. Hosts call this from the
    /// frame loop at whatever cadence they like.
    pub fn sweep_stale_tokens(&self) -> usize {
        match self.settings.token_ttl_secs {
            Some(secs) => self.tokens.sweep(Duration::from_secs(secs)),
            None => 0,
        }
    }

    /// Server-announced token/object mapping (old protocol versions).
    fn handle_entity_creation(&self, payload: &[u8]) -> Result<(), RpcError> {
        let mut reader = WireReader::new(payload);
        let token = reader.read_u16()? as u32;
        let object_id = reader.read_u16()?;
        self.tokens.register(token, object_id);
        Ok(())
    }

    /// Pass 1: route the command, decode the preamble, scan the arguments
    /// for preconditions, and enqueue one deferred unit. Runs on the
    /// delivery thread; nothing here blocks or executes natives.
    fn handle_native_rpc(&self, payload: &[u8]) -> Result<(), RpcError> {
        let mut reader = WireReader::new(payload);

        let native_hash = reader.read_u64()?;
        let resource_hash = reader.read_u32()?;

        let native = self
            .catalog
            .find(native_hash)
            .cloned()
            .ok_or(RpcError::UnknownNative(native_hash))?;
        let target = self
            .resources
            .lookup(resource_hash)
            .ok_or(RpcError::UnknownResource(resource_hash))?;

        let creation_token = match native.kind {
            RpcKind::EntityCreate => {
                if self.protocol.wide_creation_tokens() {
                    Some(reader.read_u32()?)
                } else {
                    Some(reader.read_u16()? as u32)
                }
            }
            RpcKind::ObjectCreate => Some(reader.read_u32()?),
            RpcKind::Generic => None,
        };

        let args_offset = reader.position();
        let mut conditions: Vec<Box<dyn Fn() -> bool + Send>> = Vec::new();
        let mut cleanups: Vec<Box<dyn FnOnce() + Send>> = Vec::new();

        for arg in &native.args {
            match arg {
                ArgumentType::Player => {
                    if self.protocol.wide_player_ids() {
                        reader.read_u16()?;
                    } else {
                        reader.read_u8()?;
                    }
                }
                ArgumentType::ObjRef | ArgumentType::ObjDel => {
                    reader.read_u32()?;
                }
                ArgumentType::Entity => {
                    let value = reader.read_u32()?;
                    if tokens::is_forward_ref(value) {
                        let token = tokens::token_of(value);
                        let table = Arc::clone(&self.tokens);
                        let entities = Arc::clone(&self.services.entities);
                        conditions.push(Box::new(move || {
                            table
                                .resolve(token)
                                .and_then(|object_id| entities.entity_for_object(object_id))
                                .is_some()
                        }));
                    }
                }
                ArgumentType::Int => {
                    reader.read_u32()?;
                }
                ArgumentType::Hash => {
                    let hash = reader.read_u32()?;
                    let is_model = native.kind == RpcKind::EntityCreate
                        || self.services.models.is_archetype(hash);
                    if is_model && !self.services.models.is_loaded(hash) {
                        self.services.models.request_load(hash);
                        let models = Arc::clone(&self.services.models);
                        conditions.push(Box::new(move || models.is_loaded(hash)));
                        let models = Arc::clone(&self.services.models);
                        cleanups.push(Box::new(move || models.release(hash)));
                    }
                }
                ArgumentType::Float => {
                    reader.read_f32()?;
                }
                ArgumentType::Bool => {
                    reader.read_u8()?;
                }
                ArgumentType::String => {
                    reader.skip_string()?;
                }
            }
        }

        debug!(
            target: "rpc",
            "queueing native {} ({:#018x}) for resource {:#010x}, {} condition(s)",
            native.name,
            native_hash,
            resource_hash,
            conditions.len()
        );

        let plan = ExecutionPlan {
            payload: payload.to_vec(),
            args_offset,
            native,
            creation_token,
            protocol: self.protocol,
            release_assets_on_failure: self.settings.release_assets_on_failure,
            tokens: Arc::clone(&self.tokens),
            objects: Arc::clone(&self.objects),
            runtime: Arc::clone(&self.services.runtime),
            entities: Arc::clone(&self.services.entities),
            players: Arc::clone(&self.services.players),
            net: Arc::clone(&self.services.net),
            cleanups,
        };

        let action = move || plan.run();
        let unit = if conditions.is_empty() {
            DeferredUnit::new(action)
        } else {
            DeferredUnit::with_condition(action, move || conditions.iter().all(|c| c()))
        };

        target.queue().enqueue(unit);
        Ok(())
    }
}
