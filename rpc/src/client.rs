//! The local RPC client: every node query and command behind one value.
//!
//! The client never talks to subsystems directly; it holds the capability
//! traits from [`crate::capabilities`] plus the event bus subscriber, and
//! composes them into the node API.

use std::sync::Arc;

use tessel_pubsub::{EventSubscriber, Query};
use tessel_types::{BlockHash, RequestQuery, Tx, TxHash, TxProof, TxResult};
use tokio::sync::mpsc;
use tracing::{info, Instrument};

use crate::broadcast::BroadcastCoordinator;
use crate::capabilities::{AppConn, BlockStore, Mempool, P2p, TxIndexer};
use crate::config::RpcConfig;
use crate::error::{RpcError, StoreError};
use crate::metrics::RpcMetrics;
use crate::pagination::{validate_per_page, OrderBy, Page};
use crate::responses::*;
use crate::shutdown::ShutdownSignal;
use crate::subscriptions::SubscriptionManager;
use crate::tracing_spans::rpc_span;

/// The node subsystems the client is built on.
#[derive(Clone)]
pub struct Capabilities {
    pub mempool: Arc<dyn Mempool>,
    pub p2p: Arc<dyn P2p>,
    pub store: Arc<dyn BlockStore>,
    pub indexer: Arc<dyn TxIndexer>,
    pub app: Arc<dyn AppConn>,
}

pub struct Client {
    caps: Capabilities,
    subscriptions: Arc<SubscriptionManager>,
    broadcaster: BroadcastCoordinator,
    metrics: Arc<RpcMetrics>,
}

impl Client {
    pub fn new(
        caps: Capabilities,
        bus: Arc<dyn EventSubscriber>,
        config: &RpcConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        let metrics = Arc::new(RpcMetrics::new());
        let subscriptions = Arc::new(SubscriptionManager::new(
            bus,
            config,
            shutdown.clone(),
            metrics.clone(),
        ));
        let broadcaster = BroadcastCoordinator::new(
            caps.mempool.clone(),
            caps.p2p.clone(),
            subscriptions.clone(),
            config.commit_timeout(),
            shutdown,
            metrics.clone(),
        );
        Self {
            caps,
            subscriptions,
            broadcaster,
            metrics,
        }
    }

    pub fn metrics(&self) -> &RpcMetrics {
        &self.metrics
    }

    // ── Info ────────────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<ResultStatus, RpcError> {
        let height = self.caps.store.height();
        let sync_info = if height == 0 {
            SyncInfo::default()
        } else {
            let block = self.caps.store.load_block(height)?;
            SyncInfo {
                latest_block_hash: block.hash(),
                latest_app_hash: block.header.app_hash.to_vec(),
                latest_block_height: height,
                latest_block_time: block.header.time,
            }
        };
        Ok(ResultStatus { sync_info })
    }

    pub async fn net_info(&self) -> Result<ResultNetInfo, RpcError> {
        let peers = self.caps.p2p.peers();
        Ok(ResultNetInfo {
            listening: true,
            listeners: self.caps.p2p.listen_addrs(),
            n_peers: peers.len(),
            peers,
        })
    }

    pub async fn health(&self) -> Result<ResultHealth, RpcError> {
        Ok(ResultHealth {})
    }

    pub async fn genesis(&self) -> Result<ResultGenesis, RpcError> {
        let genesis = self.caps.store.genesis()?;
        Ok(ResultGenesis { genesis })
    }

    // ── ABCI ────────────────────────────────────────────────────────────

    pub async fn abci_info(&self) -> Result<ResultAbciInfo, RpcError> {
        let response = self.caps.app.info().await?;
        Ok(ResultAbciInfo { response })
    }

    pub async fn abci_query(&self, path: &str, data: &[u8]) -> Result<ResultAbciQuery, RpcError> {
        self.abci_query_with_options(path, data, AbciQueryOptions::default())
            .await
    }

    pub async fn abci_query_with_options(
        &self,
        path: &str,
        data: &[u8],
        opts: AbciQueryOptions,
    ) -> Result<ResultAbciQuery, RpcError> {
        let request = RequestQuery {
            path: path.to_string(),
            data: data.to_vec(),
            height: opts.height,
            prove: opts.prove,
        };
        let response = self.caps.app.query(request).await?;
        info!(path, height = opts.height, code = response.code, "abci_query");
        Ok(ResultAbciQuery { response })
    }

    // ── Broadcast ───────────────────────────────────────────────────────

    pub async fn broadcast_tx_async(&self, tx: Tx) -> Result<ResultBroadcastTx, RpcError> {
        self.broadcaster.broadcast_tx_async(tx).await
    }

    pub async fn broadcast_tx_sync(&self, tx: Tx) -> Result<ResultBroadcastTx, RpcError> {
        self.broadcaster.broadcast_tx_sync(tx).await
    }

    pub async fn broadcast_tx_commit(&self, tx: Tx) -> Result<ResultBroadcastTxCommit, RpcError> {
        self.broadcaster.broadcast_tx_commit(tx).await
    }

    /// Validate against the application without adding to the mempool.
    pub async fn check_tx(&self, tx: Tx) -> Result<ResultCheckTx, RpcError> {
        let response = self
            .caps
            .app
            .check_tx(&tx)
            .instrument(rpc_span("check_tx"))
            .await?;
        Ok(ResultCheckTx { response })
    }

    // ── Events ──────────────────────────────────────────────────────────

    pub async fn subscribe(
        &self,
        subscriber: &str,
        query: &str,
        capacity: Option<usize>,
    ) -> Result<mpsc::Receiver<ResultEvent>, RpcError> {
        self.subscriptions.subscribe(subscriber, query, capacity).await
    }

    pub async fn unsubscribe(&self, subscriber: &str, query: &str) -> Result<(), RpcError> {
        self.subscriptions.unsubscribe(subscriber, query)
    }

    pub async fn unsubscribe_all(&self, subscriber: &str) -> Result<(), RpcError> {
        self.subscriptions.unsubscribe_all(subscriber)
    }

    // ── Mempool ─────────────────────────────────────────────────────────

    pub async fn unconfirmed_txs(
        &self,
        limit: Option<i64>,
    ) -> Result<ResultUnconfirmedTxs, RpcError> {
        let limit = validate_per_page(limit);
        let txs = self.caps.mempool.reap_max_txs(limit);
        Ok(ResultUnconfirmedTxs {
            count: txs.len(),
            total: self.caps.mempool.size(),
            total_bytes: self.caps.mempool.txs_bytes(),
            txs,
        })
    }

    pub async fn num_unconfirmed_txs(&self) -> Result<ResultUnconfirmedTxs, RpcError> {
        let total = self.caps.mempool.size();
        Ok(ResultUnconfirmedTxs {
            count: total,
            total,
            total_bytes: self.caps.mempool.txs_bytes(),
            txs: Vec::new(),
        })
    }

    // ── Transactions ────────────────────────────────────────────────────

    pub async fn tx(&self, hash: &[u8], prove: bool) -> Result<ResultTx, RpcError> {
        let hash = TxHash::from_slice(hash)?;
        let found = self
            .caps
            .indexer
            .get(&hash)
            .instrument(rpc_span("tx"))
            .await?
            .ok_or_else(|| RpcError::NotFound(format!("tx ({hash})")))?;
        self.result_tx(found, prove)
    }

    /// Search indexed transactions, then sort and paginate the matches.
    pub async fn tx_search(
        &self,
        query: &str,
        prove: bool,
        page: Option<i64>,
        per_page: Option<i64>,
        order_by: &str,
    ) -> Result<ResultTxSearch, RpcError> {
        let query = Query::parse(query)?;
        let order: OrderBy = order_by.parse()?;

        let mut results = self
            .caps
            .indexer
            .search(&query)
            .instrument(rpc_span("tx_search"))
            .await?;
        order.sort(&mut results);

        let total_count = results.len();
        let page = Page::new(page, per_page, total_count)?;
        let txs = page
            .slice(results)
            .into_iter()
            .map(|r| self.result_tx(r, prove))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResultTxSearch { txs, total_count })
    }

    fn result_tx(&self, found: TxResult, prove: bool) -> Result<ResultTx, RpcError> {
        let proof = if prove {
            let block = self.caps.store.load_block(found.height)?;
            let proof = TxProof::new(&block.txs, found.index as usize).ok_or_else(|| {
                StoreError::NotFound(format!(
                    "tx index {} in block {}",
                    found.index, found.height
                ))
            })?;
            Some(proof)
        } else {
            None
        };
        Ok(ResultTx {
            hash: found.tx.hash(),
            height: found.height,
            index: found.index,
            tx_result: found.result,
            tx: found.tx,
            proof,
        })
    }

    // ── Blocks ──────────────────────────────────────────────────────────

    /// Block at `height`, or the latest block when `height` is `None`.
    pub async fn block(&self, height: Option<u64>) -> Result<ResultBlock, RpcError> {
        let height = self.resolve_height(height)?;
        Ok(self.caps.store.load_block(height)?.into())
    }

    pub async fn block_by_hash(&self, hash: &[u8]) -> Result<ResultBlock, RpcError> {
        let bytes: [u8; 32] = hash.try_into().map_err(|_| {
            RpcError::InvalidRequest(format!("block hash must be 32 bytes, got {}", hash.len()))
        })?;
        let block = self.caps.store.load_block_by_hash(&BlockHash::new(bytes))?;
        Ok(block.into())
    }

    pub async fn block_results(&self, height: Option<u64>) -> Result<ResultBlockResults, RpcError> {
        let height = self.resolve_height(height)?;
        let responses = self.caps.store.load_block_responses(height)?;
        Ok(ResultBlockResults {
            height,
            txs_results: responses.deliver_txs,
            begin_block_events: responses.begin_block_events,
            end_block_events: responses.end_block_events,
        })
    }

    fn resolve_height(&self, height: Option<u64>) -> Result<u64, RpcError> {
        let latest = self.caps.store.height();
        match height {
            None | Some(0) => Ok(latest),
            Some(h) if h > latest => Err(RpcError::InvalidRequest(format!(
                "height {h} must be less than or equal to the current blockchain height {latest}"
            ))),
            Some(h) => Ok(h),
        }
    }

    // ── Unsupported ─────────────────────────────────────────────────────
    //
    // This node does not expose consensus internals or the block index.

    pub async fn genesis_chunked(&self, _id: u32) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("genesis_chunked"))
    }

    pub async fn blockchain_info(&self, _min_height: u64, _max_height: u64) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("blockchain_info"))
    }

    pub async fn consensus_params(&self, _height: Option<u64>) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("consensus_params"))
    }

    pub async fn commit(&self, _height: Option<u64>) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("commit"))
    }

    pub async fn validators(
        &self,
        _height: Option<u64>,
        _page: Option<i64>,
        _per_page: Option<i64>,
    ) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("validators"))
    }

    pub async fn block_search(
        &self,
        _query: &str,
        _page: Option<i64>,
        _per_page: Option<i64>,
        _order_by: &str,
    ) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("block_search"))
    }

    pub async fn broadcast_evidence(&self, _evidence: &[u8]) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("broadcast_evidence"))
    }

    pub async fn dump_consensus_state(&self) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("dump_consensus_state"))
    }

    pub async fn consensus_state(&self) -> Result<(), RpcError> {
        Err(RpcError::UnsupportedOperation("consensus_state"))
    }
}
