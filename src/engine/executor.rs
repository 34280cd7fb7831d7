//! Pass 2 of native replay: once a unit's readiness predicate holds, rewind
//! to the recorded argument offset, decode every argument for real, invoke
//! the native, and apply kind-specific post-processing.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::engine::objects::ObjectHandles;
use crate::engine::tokens::{self, CreationTokens};
use crate::host::{
    CallContext, CallValue, EntityDirectory, PlayerDirectory, ReliableSink, ScriptRuntime,
};
use crate::protocol::{ProtocolVersion, MSG_ENTITY_CREATE};
use crate::schema::{ArgumentType, NativeDescriptor, RpcKind};
use crate::wire::{WireError, WireReader, WireWriter};

/// Everything a deferred unit needs to execute one native call. Owns a
/// snapshot of the command payload; nothing here borrows the live decode
/// buffer the network thread saw.
pub(crate) struct ExecutionPlan {
    pub payload: Vec<u8>,
    /// Offset of the first argument byte, recorded before the Pass 1 scan.
    pub args_offset: usize,
    pub native: Arc<NativeDescriptor>,
    pub creation_token: Option<u32>,
    pub protocol: ProtocolVersion,
    pub release_assets_on_failure: bool,
    pub tokens: Arc<CreationTokens>,
    pub objects: Arc<ObjectHandles>,
    pub runtime: Arc<dyn ScriptRuntime>,
    pub entities: Arc<dyn EntityDirectory>,
    pub players: Arc<dyn PlayerDirectory>,
    pub net: Arc<dyn ReliableSink>,
    pub cleanups: Vec<Box<dyn FnOnce() + Send>>,
}

impl ExecutionPlan {
    /// Run the call to completion. All failures are handled here: the unit
    /// is abandoned, never retried, and nothing propagates to the caller.
    pub(crate) fn run(mut self) {
        let cleanups = std::mem::take(&mut self.cleanups);

        let mut reader = WireReader::new(&self.payload);
        if reader.seek(self.args_offset).is_err() {
            warn!(
                target: "rpc",
                "argument offset {} out of range for {} byte payload",
                self.args_offset,
                self.payload.len()
            );
            return;
        }

        let mut ctx = match self.decode_arguments(&mut reader) {
            Ok(Some(ctx)) => ctx,
            // A reference failed to translate; already logged, hard skip.
            Ok(None) => return,
            Err(e) => {
                warn!(
                    target: "rpc",
                    "malformed payload for native {} ({:#018x}): {}",
                    self.native.name, self.native.game_hash, e
                );
                return;
            }
        };

        if let Err(e) = self.runtime.invoke(self.native.game_hash, &mut ctx) {
            error!(
                target: "rpc",
                "failure executing native rpc {} ({:#018x}): {}",
                self.native.name, self.native.game_hash, e
            );
            if self.release_assets_on_failure {
                for cleanup in cleanups {
                    cleanup();
                }
            }
            return;
        }

        match self.native.kind {
            RpcKind::EntityCreate => self.finish_entity_create(&ctx),
            RpcKind::ObjectCreate => {
                if let Some(token) = self.creation_token {
                    self.objects.store(token, ctx.result_u32());
                }
            }
            RpcKind::Generic => {}
        }

        for cleanup in cleanups {
            cleanup();
        }
    }

    /// Decode the full argument list in schema order, consuming exactly the
    /// bytes the Pass 1 scan consumed. `Ok(None)` means a player, entity, or
    /// object reference did not translate and the unit is abandoned.
    fn decode_arguments(
        &self,
        reader: &mut WireReader<'_>,
    ) -> Result<Option<CallContext>, WireError> {
        let mut ctx = CallContext::new();

        for arg in &self.native.args {
            match arg {
                ArgumentType::Player => {
                    if self.protocol.wide_player_ids() {
                        let net_id = reader.read_u16()?;
                        match self.players.player_for_net_id(net_id) {
                            Some(player) => ctx.push(CallValue::Int(player)),
                            None => {
                                debug!(target: "rpc", "player net id {} not found, skipping unit", net_id);
                                return Ok(None);
                            }
                        }
                    } else {
                        let index = reader.read_u8()?;
                        ctx.push(CallValue::Int(index as u32));
                    }
                }
                ArgumentType::Entity => {
                    let mut value = reader.read_u32()?;
                    if tokens::is_forward_ref(value) {
                        // The composite predicate guaranteed this resolves.
                        match self.tokens.resolve(tokens::token_of(value)) {
                            Some(object_id) => value = object_id,
                            None => {
                                warn!(
                                    target: "rpc",
                                    "creation token {} unresolved at execution time",
                                    tokens::token_of(value)
                                );
                                return Ok(None);
                            }
                        }
                    }
                    match self.entities.entity_for_object(value) {
                        Some(entity) => ctx.push(CallValue::Int(entity)),
                        None => {
                            debug!(target: "rpc", "object id {:#x} has no live entity, skipping unit", value);
                            return Ok(None);
                        }
                    }
                }
                ArgumentType::Int | ArgumentType::Hash => {
                    ctx.push(CallValue::Int(reader.read_u32()?));
                }
                ArgumentType::Float => {
                    ctx.push(CallValue::Float(reader.read_f32()?));
                }
                ArgumentType::Bool => {
                    ctx.push(CallValue::Bool(reader.read_u8()? != 0));
                }
                ArgumentType::ObjRef => {
                    let index = reader.read_u32()?;
                    match self.objects.get(index) {
                        Some(handle) => ctx.push(CallValue::Int(handle)),
                        None => {
                            debug!(target: "rpc", "object index {} unknown, skipping unit", index);
                            return Ok(None);
                        }
                    }
                }
                ArgumentType::ObjDel => {
                    let index = reader.read_u32()?;
                    match self.objects.get(index) {
                        Some(handle) => ctx.push(CallValue::ByRef(handle)),
                        None => {
                            debug!(target: "rpc", "object index {} unknown, skipping unit", index);
                            return Ok(None);
                        }
                    }
                }
                ArgumentType::String => {
                    ctx.push(CallValue::Str(reader.read_string()?));
                }
            }
        }

        Ok(Some(ctx))
    }

    /// Read back the created entity, register the token/object mapping, and
    /// on old protocol versions tell the server about it explicitly.
    fn finish_entity_create(&self, ctx: &CallContext) {
        let Some(token) = self.creation_token else {
            return;
        };

        let entity = ctx.result_u32();
        let Some(object_id) = self.entities.object_for_entity(entity) else {
            debug!(
                target: "rpc",
                "created entity {:#x} has no network object, token {} left unmapped",
                entity, token
            );
            return;
        };

        self.tokens.register(token, object_id);

        if self.protocol.needs_creation_ack() {
            let mut writer = WireWriter::new();
            writer.write_u16(token as u16);
            writer.write_u16(object_id);
            self.net.send(MSG_ENTITY_CREATE, writer.into_vec());
        }
    }
}
