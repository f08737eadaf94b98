//! RPC error types.
//!
//! Errors from the commit and broadcast paths carry whatever the node had
//! already learned about the transaction (its hash and, once validation
//! finished, the check result) so callers can still act on it.

use tessel_pubsub::{BusError, QueryError};
use tessel_types::{ResponseCheckTx, TxHash, TypesError};
use thiserror::Error;

/// Failures reported by the mempool capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error("mempool is full: number of txs {size} (max: {max})")]
    Full { size: usize, max: usize },

    #[error("tx already exists in cache")]
    AlreadyInCache,

    #[error("tx too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("tx not found in mempool")]
    NotFound,

    #[error("mempool dropped the check result")]
    ResultDropped,

    #[error("mempool error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum P2pError {
    #[error("no peers to gossip to")]
    NoPeers,

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("transaction indexing is disabled")]
    Disabled,

    #[error("indexer error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("application connection error: {0}")]
    Connection(String),
}

/// Which admission limit a subscribe request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionLimit {
    #[error("max_subscription_clients {max} reached")]
    Clients { max: usize },

    #[error("max_subscriptions_per_client {max} reached")]
    SubscriptionsPerClient { max: usize },
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    AdmissionLimitExceeded(#[from] AdmissionLimit),

    #[error("failed to subscribe: {0}")]
    SubscriptionSetupFailed(String),

    #[error(
        "tx {hash} was accepted by the local mempool but could not be gossiped \
         (removed from mempool: {rolled_back}): {source}"
    )]
    BroadcastFailedAfterAccept {
        hash: TxHash,
        check_tx: Option<Box<ResponseCheckTx>>,
        rolled_back: bool,
        #[source]
        source: P2pError,
    },

    #[error("timed out waiting for tx {hash} to be included in a block")]
    CommitTimeout {
        hash: TxHash,
        check_tx: Box<ResponseCheckTx>,
    },

    #[error("subscription for tx {hash} was cancelled (reason: {reason})")]
    CommitCancelled {
        hash: TxHash,
        check_tx: Option<Box<ResponseCheckTx>>,
        reason: String,
    },

    #[error("page should be within [1, {pages}] range, given {given}")]
    PaginationRange { pages: usize, given: i64 },

    #[error("expected order_by to be either `asc` or `desc` or empty, given {0:?}")]
    InvalidOrderToken(String),

    #[error("{0} is not supported by this node")]
    UnsupportedOperation(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected event: {0}")]
    UnexpectedEvent(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Subscription(#[from] BusError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    /// The validation result already obtained before the failure, if any.
    pub fn partial_check_tx(&self) -> Option<&ResponseCheckTx> {
        match self {
            RpcError::CommitTimeout { check_tx, .. } => Some(check_tx),
            RpcError::CommitCancelled { check_tx, .. }
            | RpcError::BroadcastFailedAfterAccept { check_tx, .. } => check_tx.as_deref(),
            _ => None,
        }
    }

    /// Hash of the transaction a broadcast error refers to.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            RpcError::CommitTimeout { hash, .. }
            | RpcError::CommitCancelled { hash, .. }
            | RpcError::BroadcastFailedAfterAccept { hash, .. } => Some(*hash),
            _ => None,
        }
    }
}

impl From<TypesError> for RpcError {
    fn from(e: TypesError) -> Self {
        RpcError::InvalidRequest(e.to_string())
    }
}
