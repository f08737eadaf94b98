//! The chain's genesis document.

use serde::{Deserialize, Serialize};

use crate::abci::hex_bytes;

/// Initial conditions the chain was started from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDoc {
    /// Genesis time, nanoseconds since the UNIX epoch.
    pub genesis_time: u64,
    pub chain_id: String,
    /// Height of the first block. Chains started fresh use 1.
    pub initial_height: u64,
    #[serde(with = "hex_bytes")]
    pub app_hash: Vec<u8>,
    /// Application-defined initial state. Opaque to the node.
    #[serde(with = "hex_bytes")]
    pub app_state: Vec<u8>,
}

impl GenesisDoc {
    /// A genesis for `chain_id` starting at height 1.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            initial_height: 1,
            ..Self::default()
        }
    }
}
