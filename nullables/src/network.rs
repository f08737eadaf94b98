//! Nullable p2p layer: records gossip, fails on demand.

use std::sync::Mutex;

use async_trait::async_trait;
use tessel_rpc::{P2p, P2pError};
use tessel_types::{PeerInfo, Tx};

/// An in-memory gossip layer that records every transaction handed to it.
pub struct NullP2p {
    gossiped: Mutex<Vec<Tx>>,
    failure: Mutex<Option<P2pError>>,
    peers: Mutex<Vec<PeerInfo>>,
    listen_addrs: Vec<String>,
}

impl NullP2p {
    pub fn new() -> Self {
        Self {
            gossiped: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            peers: Mutex::new(Vec::new()),
            listen_addrs: vec!["tcp://0.0.0.0:26656".to_string()],
        }
    }

    /// Fail every following gossip with `err` until [`recover`](Self::recover).
    pub fn fail_with(&self, err: P2pError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn add_peer(&self, peer: PeerInfo) {
        self.peers.lock().unwrap().push(peer);
    }

    /// Transactions gossiped successfully, in order.
    pub fn gossiped(&self) -> Vec<Tx> {
        self.gossiped.lock().unwrap().clone()
    }

    pub fn gossip_calls(&self) -> usize {
        self.gossiped.lock().unwrap().len()
    }
}

impl Default for NullP2p {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl P2p for NullP2p {
    async fn gossip_tx(&self, tx: &Tx) -> Result<(), P2pError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.gossiped.lock().unwrap().push(tx.clone());
        Ok(())
    }

    fn listen_addrs(&self) -> Vec<String> {
        self.listen_addrs.clone()
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.peers.lock().unwrap().clone()
    }
}
