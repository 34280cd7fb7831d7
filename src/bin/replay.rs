//! Replay hex-encoded RPC commands through the engine against stub
//! collaborators. Useful for checking a catalog file and eyeballing the
//! decode/defer/execute flow without a live server.
//!
//! Command file format, one command per line:
//!
//! ```text
//! # comment
//! native 3412.. (hex payload for msgRpcNative)
//! ack    0500.. (hex payload for msgRpcEntityCreation)
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ricochet::protocol::{MSG_RPC_ENTITY_CREATION, MSG_RPC_NATIVE};
use ricochet::{
    CallContext, EngineSettings, EntityDirectory, HostServices, InvokeError, ModelRegistry,
    PlayerDirectory, ProtocolVersion, ReliableSink, ResourceHandle, RpcCatalog, RpcEngine,
    ScriptRuntime,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the native catalog (TOML)
    catalog: PathBuf,

    /// Path to the command file to replay
    commands: PathBuf,

    /// Resource name commands should target
    #[arg(long, default_value = "replay")]
    resource: String,

    /// Negotiated protocol version, as a hex integer
    #[arg(long, default_value = "0x202103030422", value_parser = parse_hex_u64)]
    protocol: u64,

    /// Maximum number of frames to drain after feeding commands
    #[arg(long, default_value_t = 60)]
    frames: u32,
}

fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).context("bad hex digit"))
        .collect()
}

struct ReplayResource {
    name: String,
}

impl ResourceHandle for ReplayResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self) {
        debug!(target: "rpc", "[{}] activated", self.name);
    }

    fn deactivate(&self) {
        debug!(target: "rpc", "[{}] deactivated", self.name);
    }
}

/// Logs every invocation and hands back a fresh fake handle as the result.
struct LoggingRuntime {
    next_handle: AtomicU32,
}

impl ScriptRuntime for LoggingRuntime {
    fn invoke(&self, native_hash: u64, ctx: &mut CallContext) -> Result<(), InvokeError> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        info!(target: "rpc", "invoke {:#018x} args={:?} -> {:#x}", native_hash, ctx.args(), handle);
        ctx.set_result(handle);
        Ok(())
    }
}

/// Every object id maps straight to an entity handle and back.
struct MirrorEntities;

impl EntityDirectory for MirrorEntities {
    fn entity_for_object(&self, object_id: u32) -> Option<u32> {
        Some(object_id & 0xFFFF)
    }

    fn object_for_entity(&self, entity: u32) -> Option<u16> {
        Some(entity as u16)
    }
}

struct MirrorPlayers;

impl PlayerDirectory for MirrorPlayers {
    fn player_for_net_id(&self, net_id: u16) -> Option<u32> {
        Some(net_id as u32)
    }
}

/// Everything is an archetype and already streamed in, so no unit ever
/// waits on a load.
struct EagerModels;

impl ModelRegistry for EagerModels {
    fn is_archetype(&self, _hash: u32) -> bool {
        true
    }

    fn is_loaded(&self, _hash: u32) -> bool {
        true
    }

    fn request_load(&self, hash: u32) {
        info!(target: "rpc", "request_load {:#010x}", hash);
    }

    fn release(&self, hash: u32) {
        info!(target: "rpc", "release {:#010x}", hash);
    }
}

struct LoggingSink;

impl ReliableSink for LoggingSink {
    fn send(&self, tag: &str, payload: Vec<u8>) {
        info!(target: "net", "outbound {} ({} bytes)", tag, payload.len());
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let catalog = Arc::new(RpcCatalog::load(&cli.catalog)?);
    let engine = RpcEngine::new(
        catalog,
        ProtocolVersion(cli.protocol),
        EngineSettings::default(),
        HostServices {
            runtime: Arc::new(LoggingRuntime {
                next_handle: AtomicU32::new(0x1000),
            }),
            entities: Arc::new(MirrorEntities),
            players: Arc::new(MirrorPlayers),
            models: Arc::new(EagerModels),
            net: Arc::new(LoggingSink),
        },
    );

    let hash = engine.resources().register(Arc::new(ReplayResource {
        name: cli.resource.clone(),
    }));
    info!(target: "rpc", "resource {:?} registered as {:#010x}", cli.resource, hash);

    let commands = fs::read_to_string(&cli.commands)
        .with_context(|| format!("reading {}", cli.commands.display()))?;

    for (lineno, line) in commands.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (tag, hex) = line
            .split_once(char::is_whitespace)
            .with_context(|| format!("line {}: expected '<tag> <hex>'", lineno + 1))?;
        let tag = match tag {
            "native" => MSG_RPC_NATIVE,
            "ack" => MSG_RPC_ENTITY_CREATION,
            other => bail!("line {}: unknown tag {:?}", lineno + 1, other),
        };
        let payload = parse_hex_bytes(hex.trim())
            .with_context(|| format!("line {}: bad payload", lineno + 1))?;
        if let Err(e) = engine.handle_command(tag, &payload) {
            warn!(target: "rpc", "line {}: command dropped: {}", lineno + 1, e);
        }
    }

    for frame in 0..cli.frames {
        let executed = engine.resources().tick_all();
        if executed > 0 {
            info!(target: "rpc", "frame {}: executed {} unit(s)", frame, executed);
        }
        if engine.resources().pending() == 0 {
            break;
        }
    }

    let left = engine.resources().pending();
    if left > 0 {
        warn!(target: "rpc", "{} unit(s) still waiting after {} frames", left, cli.frames);
    }

    Ok(())
}
