//! Peer descriptors reported by the p2p layer.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub node_id: String,
    pub moniker: String,
    pub listen_addr: String,
    pub is_outbound: bool,
    pub remote_ip: String,
}
