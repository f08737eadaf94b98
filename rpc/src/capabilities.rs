//! The narrow interfaces the RPC layer needs from the rest of the node.
//!
//! Each collaborator is reached only through one of these traits, so the
//! client can be wired against real subsystems or in-memory stand-ins.

use async_trait::async_trait;
use tessel_pubsub::Query;
use tessel_types::{
    Block, BlockHash, BlockResponses, GenesisDoc, PeerInfo, RequestQuery, ResponseCheckTx,
    ResponseInfo, ResponseQuery, Tx, TxHash, TxKey, TxResult,
};
use tokio::sync::oneshot;

use crate::error::{AppError, IndexError, MempoolError, P2pError, StoreError};

/// Pending validation outcome for a submitted transaction.
pub type CheckTxReceipt = oneshot::Receiver<ResponseCheckTx>;

pub trait Mempool: Send + Sync {
    /// Submit `tx` for validation.
    ///
    /// An `Err` is an immediate refusal (full pool, duplicate, oversize).
    /// Otherwise the validation result arrives on the receipt. Callers may
    /// drop the receipt without waiting, so implementations must not treat a
    /// closed receipt as a failure.
    fn check_tx(&self, tx: &Tx) -> Result<CheckTxReceipt, MempoolError>;

    /// Remove a transaction that was accepted but must be rolled back.
    fn remove_tx_by_key(&self, key: &TxKey) -> Result<(), MempoolError>;

    /// Number of pending transactions.
    fn size(&self) -> usize;

    /// Total size of pending transactions in bytes.
    fn txs_bytes(&self) -> u64;

    /// Up to `max` pending transactions in priority order.
    fn reap_max_txs(&self, max: usize) -> Vec<Tx>;
}

#[async_trait]
pub trait P2p: Send + Sync {
    /// Push a transaction to connected peers.
    async fn gossip_tx(&self, tx: &Tx) -> Result<(), P2pError>;

    fn listen_addrs(&self) -> Vec<String>;

    fn peers(&self) -> Vec<PeerInfo>;
}

pub trait BlockStore: Send + Sync {
    /// Height of the latest stored block; 0 when the store is empty.
    fn height(&self) -> u64;

    fn load_block(&self, height: u64) -> Result<Block, StoreError>;

    fn load_block_by_hash(&self, hash: &BlockHash) -> Result<Block, StoreError>;

    fn load_block_responses(&self, height: u64) -> Result<BlockResponses, StoreError>;

    /// The genesis document the chain was started from.
    fn genesis(&self) -> Result<GenesisDoc, StoreError>;
}

#[async_trait]
pub trait TxIndexer: Send + Sync {
    async fn get(&self, hash: &TxHash) -> Result<Option<TxResult>, IndexError>;

    /// All indexed transactions matching `query`, in no particular order.
    async fn search(&self, query: &Query) -> Result<Vec<TxResult>, IndexError>;
}

/// Connection to the application for queries and standalone validation.
#[async_trait]
pub trait AppConn: Send + Sync {
    async fn info(&self) -> Result<ResponseInfo, AppError>;

    async fn query(&self, request: RequestQuery) -> Result<ResponseQuery, AppError>;

    async fn check_tx(&self, tx: &Tx) -> Result<ResponseCheckTx, AppError>;
}
