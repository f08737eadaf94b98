//! Transaction broadcast in three modes.
//!
//! - **async**: submit to the mempool and gossip, without waiting for the
//!   validation result.
//! - **sync**: wait for validation; gossip only accepted transactions and
//!   roll the mempool entry back if gossip fails.
//! - **commit**: subscribe to the transaction's inclusion event first, then
//!   submit, validate and gossip, and wait for the event, the subscription
//!   being cancelled, the commit timeout or process shutdown, whichever
//!   comes first.
//!
//! The commit subscription is held by a [`SubscriptionGuard`], so it is
//! released on every exit path.

use std::sync::Arc;
use std::time::Duration;

use tessel_pubsub::{CancelReason, Message, Query};
use tessel_types::{EventData, ResponseCheckTx, Tx, TxHash};
use tokio::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::capabilities::{CheckTxReceipt, Mempool, P2p};
use crate::error::{MempoolError, RpcError};
use crate::metrics::RpcMetrics;
use crate::responses::{ResultBroadcastTx, ResultBroadcastTxCommit};
use crate::shutdown::ShutdownSignal;
use crate::subscriptions::SubscriptionManager;
use crate::tracing_spans::broadcast_span;

pub use crate::subscriptions::LOCAL_SUBSCRIBER;

/// Upper bound for registering the commit subscription.
pub const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cancellation reason reported when the process stops mid-commit.
pub const NODE_STOPPED: &str = "node stopped";

enum Outcome {
    Included(Message),
    Closed,
    Cancelled(CancelReason),
    Stopped,
    TimedOut,
}

pub struct BroadcastCoordinator {
    mempool: Arc<dyn Mempool>,
    p2p: Arc<dyn P2p>,
    subscriptions: Arc<SubscriptionManager>,
    commit_timeout: Duration,
    shutdown: ShutdownSignal,
    metrics: Arc<RpcMetrics>,
}

impl BroadcastCoordinator {
    pub fn new(
        mempool: Arc<dyn Mempool>,
        p2p: Arc<dyn P2p>,
        subscriptions: Arc<SubscriptionManager>,
        commit_timeout: Duration,
        shutdown: ShutdownSignal,
        metrics: Arc<RpcMetrics>,
    ) -> Self {
        Self {
            mempool,
            p2p,
            subscriptions,
            commit_timeout,
            shutdown,
            metrics,
        }
    }

    /// Submit without waiting for validation. Only the hash is reported.
    pub async fn broadcast_tx_async(&self, tx: Tx) -> Result<ResultBroadcastTx, RpcError> {
        let hash = tx.hash();
        self.metrics.record_broadcast("async");
        self.submit_async(tx, hash)
            .instrument(broadcast_span("async", &hash))
            .await
    }

    /// Submit and wait for validation. A rejected transaction is a normal
    /// result with a non-zero code.
    pub async fn broadcast_tx_sync(&self, tx: Tx) -> Result<ResultBroadcastTx, RpcError> {
        let hash = tx.hash();
        self.metrics.record_broadcast("sync");
        self.submit_sync(tx, hash)
            .instrument(broadcast_span("sync", &hash))
            .await
    }

    /// Submit, then wait for the transaction to be included in a block.
    ///
    /// A transaction rejected by validation returns immediately with the
    /// check result and no deliver result.
    pub async fn broadcast_tx_commit(&self, tx: Tx) -> Result<ResultBroadcastTxCommit, RpcError> {
        let hash = tx.hash();
        self.metrics.record_broadcast("commit");
        self.commit(tx, hash)
            .instrument(broadcast_span("commit", &hash))
            .await
    }

    async fn submit_async(&self, tx: Tx, hash: TxHash) -> Result<ResultBroadcastTx, RpcError> {
        // The validation result is not awaited; dropping the receipt is fine.
        let _receipt = self.mempool.check_tx(&tx)?;
        if let Err(source) = self.p2p.gossip_tx(&tx).await {
            self.metrics.gossip_failures.inc();
            return Err(RpcError::BroadcastFailedAfterAccept {
                hash,
                check_tx: None,
                rolled_back: false,
                source,
            });
        }
        Ok(ResultBroadcastTx::pending(hash))
    }

    async fn submit_sync(&self, tx: Tx, hash: TxHash) -> Result<ResultBroadcastTx, RpcError> {
        let receipt = self.mempool.check_tx(&tx)?;
        let check_tx = await_check(receipt).await?;
        if check_tx.is_ok() {
            if let Err(source) = self.p2p.gossip_tx(&tx).await {
                let rolled_back = self.roll_back(&tx);
                return Err(RpcError::BroadcastFailedAfterAccept {
                    hash,
                    check_tx: Some(Box::new(check_tx)),
                    rolled_back,
                    source,
                });
            }
        }
        Ok(ResultBroadcastTx::from_check(check_tx, hash))
    }

    async fn commit(&self, tx: Tx, hash: TxHash) -> Result<ResultBroadcastTxCommit, RpcError> {
        // Subscribe before submitting so the inclusion event cannot be missed.
        let query = Query::tx_for(&hash);
        let mut guard = self
            .subscriptions
            .subscribe_bounded(LOCAL_SUBSCRIBER, query, 0, SUBSCRIBE_TIMEOUT)
            .await
            .inspect_err(|err| error!(%err, "error on broadcast_tx_commit"))?;

        let started = Instant::now();
        let receipt = self
            .mempool
            .check_tx(&tx)
            .inspect_err(|err| error!(%err, "error on broadcast_tx_commit"))?;
        let check_tx = tokio::select! {
            res = await_check(receipt) => res?,
            _ = self.shutdown.wait() => {
                return Err(RpcError::CommitCancelled {
                    hash,
                    check_tx: None,
                    reason: NODE_STOPPED.to_string(),
                });
            }
        };

        if !check_tx.is_ok() {
            return Ok(ResultBroadcastTxCommit {
                check_tx,
                hash,
                ..Default::default()
            });
        }

        if let Err(source) = self.p2p.gossip_tx(&tx).await {
            self.metrics.gossip_failures.inc();
            return Err(RpcError::BroadcastFailedAfterAccept {
                hash,
                check_tx: Some(Box::new(check_tx)),
                rolled_back: false,
                source,
            });
        }

        let sub = guard.subscription();
        let mut cancel = sub.cancel_signal();
        let outcome = tokio::select! {
            biased;
            msg = sub.next() => msg.map_or(Outcome::Closed, Outcome::Included),
            reason = cancel.cancelled() => Outcome::Cancelled(reason),
            _ = self.shutdown.wait() => Outcome::Stopped,
            _ = tokio::time::sleep(self.commit_timeout) => Outcome::TimedOut,
        };

        let reason = match outcome {
            Outcome::Included(msg) => {
                let EventData::Tx(included) = msg.data else {
                    return Err(RpcError::UnexpectedEvent(msg.query));
                };
                self.metrics
                    .commit_latency_ms
                    .observe(started.elapsed().as_secs_f64() * 1000.0);
                info!(height = included.height, "tx committed");
                return Ok(ResultBroadcastTxCommit {
                    check_tx,
                    deliver_tx: included.result,
                    hash,
                    height: included.height,
                });
            }
            Outcome::TimedOut => {
                error!(timeout = ?self.commit_timeout, "error on broadcast_tx_commit: timed out");
                self.metrics.commit_timeouts.inc();
                return Err(RpcError::CommitTimeout {
                    hash,
                    check_tx: Box::new(check_tx),
                });
            }
            Outcome::Stopped => NODE_STOPPED.to_string(),
            Outcome::Closed => cancel_reason(cancel.current()),
            Outcome::Cancelled(reason) => cancel_reason(Some(reason)),
        };

        error!(%reason, "error on broadcast_tx_commit: subscription cancelled");
        self.metrics.commit_cancellations.inc();
        Err(RpcError::CommitCancelled {
            hash,
            check_tx: Some(Box::new(check_tx)),
            reason,
        })
    }

    /// Remove a locally accepted transaction after its gossip failed.
    fn roll_back(&self, tx: &Tx) -> bool {
        self.metrics.gossip_failures.inc();
        match self.mempool.remove_tx_by_key(&tx.key()) {
            Ok(()) => {
                self.metrics.mempool_rollbacks.inc();
                true
            }
            Err(err) => {
                warn!(%err, "failed to remove tx from mempool after gossip failure");
                false
            }
        }
    }
}

async fn await_check(receipt: CheckTxReceipt) -> Result<ResponseCheckTx, RpcError> {
    Ok(receipt.await.map_err(|_| MempoolError::ResultDropped)?)
}

fn cancel_reason(reason: Option<CancelReason>) -> String {
    match reason {
        None | Some(CancelReason::Shutdown) => NODE_STOPPED.to_string(),
        Some(reason) => reason.to_string(),
    }
}
