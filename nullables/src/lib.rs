//! Nullable collaborators for deterministic testing.
//!
//! Every subsystem the RPC layer talks to (mempool, gossip, block store,
//! transaction indexer, application) has an in-memory stand-in here that:
//! - returns deterministic, programmable results
//! - records the calls it received for assertions
//! - never touches the filesystem or network
//!
//! Usage: build a [`tessel_rpc::Capabilities`] from nullables in tests, or
//! call [`capabilities`] for a default set.

pub mod app;
pub mod indexer;
pub mod mempool;
pub mod network;
pub mod store;

use std::sync::Arc;

pub use app::NullApp;
pub use indexer::NullTxIndexer;
pub use mempool::NullMempool;
pub use network::NullP2p;
pub use store::NullBlockStore;

/// Handles to a full set of nullables, plus the capability bundle wired
/// from them.
pub struct Nullables {
    pub mempool: Arc<NullMempool>,
    pub p2p: Arc<NullP2p>,
    pub store: Arc<NullBlockStore>,
    pub indexer: Arc<NullTxIndexer>,
    pub app: Arc<NullApp>,
}

impl Nullables {
    pub fn capabilities(&self) -> tessel_rpc::Capabilities {
        tessel_rpc::Capabilities {
            mempool: self.mempool.clone(),
            p2p: self.p2p.clone(),
            store: self.store.clone(),
            indexer: self.indexer.clone(),
            app: self.app.clone(),
        }
    }
}

impl Default for Nullables {
    fn default() -> Self {
        Self {
            mempool: Arc::new(NullMempool::new()),
            p2p: Arc::new(NullP2p::new()),
            store: Arc::new(NullBlockStore::new()),
            indexer: Arc::new(NullTxIndexer::new()),
            app: Arc::new(NullApp::new()),
        }
    }
}

/// A default set of nullables.
pub fn capabilities() -> Nullables {
    Nullables::default()
}
