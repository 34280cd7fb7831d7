use thiserror::Error;

use crate::wire::WireError;

/// Why an inbound command was dropped. These never crash frame processing
/// and never travel back to the network layer; they exist for diagnostics.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("unknown native {0:#018x}")]
    UnknownNative(u64),
    #[error("unknown resource {0:#010x}")]
    UnknownResource(u32),
    #[error("unknown command tag {0:?}")]
    UnknownCommand(String),
}
