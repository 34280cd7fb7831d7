//! Negotiated protocol version and the reliable-command tags this engine
//! speaks. Versions are date-stamped integers compared numerically; the
//! thresholds below mark the points where the wire format changed.

/// Inbound: server confirms a creation token to object id mapping.
/// Only exchanged below [`ProtocolVersion::WIDE_CREATION_TOKENS`].
pub const MSG_RPC_ENTITY_CREATION: &str = "msgRpcEntityCreation";

/// Inbound: a native call to replay inside the simulation frame.
pub const MSG_RPC_NATIVE: &str = "msgRpcNative";

/// Outbound: client acknowledges an entity creation with the token and the
/// object id the creation produced. Only sent on old protocol versions.
pub const MSG_ENTITY_CREATE: &str = "msgEntityCreate";

/// Protocol version negotiated with the server at connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion(pub u64);

impl ProtocolVersion {
    /// From this version on, entity creation tokens are 32 bits wide and the
    /// explicit creation acknowledgement is no longer sent; the server learns
    /// the token/object mapping by other means.
    pub const WIDE_CREATION_TOKENS: ProtocolVersion = ProtocolVersion(0x2020_0227_1209);

    /// From this version on, player arguments carry a 16-bit network id that
    /// must be translated to a local player handle; before it they carry an
    /// 8-bit player index used directly.
    pub const WIDE_PLAYER_IDS: ProtocolVersion = ProtocolVersion(0x2021_0303_0422);

    pub fn wide_creation_tokens(self) -> bool {
        self >= Self::WIDE_CREATION_TOKENS
    }

    pub fn wide_player_ids(self) -> bool {
        self >= Self::WIDE_PLAYER_IDS
    }

    pub fn needs_creation_ack(self) -> bool {
        !self.wide_creation_tokens()
    }
}
