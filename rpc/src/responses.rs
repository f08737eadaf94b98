//! Result types returned by the RPC client.
//!
//! Field names follow the widely used node API so responses can be handed
//! to existing tooling unchanged.

use serde::{Deserialize, Serialize};
use tessel_types::abci::hex_bytes;
use tessel_types::{
    AbciEvent, Block, BlockHash, EventData, GenesisDoc, PeerInfo, ResponseCheckTx,
    ResponseDeliverTx, ResponseInfo, ResponseQuery, Tags, Tx, TxHash, TxProof,
};

// ── Broadcast ───────────────────────────────────────────────────────────

/// Result of `broadcast_tx_async` and `broadcast_tx_sync`.
///
/// The async mode fills in only the hash; the remaining fields stay at
/// their defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBroadcastTx {
    pub code: u32,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub log: String,
    pub codespace: String,
    pub hash: TxHash,
}

impl ResultBroadcastTx {
    pub fn pending(hash: TxHash) -> Self {
        Self {
            hash,
            ..Self::default()
        }
    }

    pub fn from_check(check: ResponseCheckTx, hash: TxHash) -> Self {
        Self {
            code: check.code,
            data: check.data,
            log: check.log,
            codespace: check.codespace,
            hash,
        }
    }
}

/// Result of `broadcast_tx_commit`.
///
/// When validation rejects the transaction, `deliver_tx` is empty and
/// `height` is 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBroadcastTxCommit {
    pub check_tx: ResponseCheckTx,
    pub deliver_tx: ResponseDeliverTx,
    pub hash: TxHash,
    pub height: u64,
}

/// Result of `check_tx`, a standalone validation that never touches the
/// mempool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCheckTx {
    #[serde(flatten)]
    pub response: ResponseCheckTx,
}

// ── Events ──────────────────────────────────────────────────────────────

/// One event delivered to an RPC subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEvent {
    pub query: String,
    pub data: EventData,
    pub events: Tags,
}

// ── Transactions ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTx {
    pub hash: TxHash,
    pub height: u64,
    pub index: u32,
    pub tx_result: ResponseDeliverTx,
    pub tx: Tx,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<TxProof>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTxSearch {
    pub txs: Vec<ResultTx>,
    /// Number of matches before pagination.
    pub total_count: usize,
}

// ── Mempool ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultUnconfirmedTxs {
    /// Number of transactions in this response.
    pub count: usize,
    /// Number of transactions in the mempool.
    pub total: usize,
    pub total_bytes: u64,
    pub txs: Vec<Tx>,
}

// ── Node ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncInfo {
    pub latest_block_hash: BlockHash,
    #[serde(with = "hex_bytes")]
    pub latest_app_hash: Vec<u8>,
    pub latest_block_height: u64,
    /// Nanoseconds since the UNIX epoch.
    pub latest_block_time: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultStatus {
    pub sync_info: SyncInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultNetInfo {
    pub listening: bool,
    pub listeners: Vec<String>,
    pub n_peers: usize,
    pub peers: Vec<PeerInfo>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultHealth {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGenesis {
    pub genesis: GenesisDoc,
}

// ── Application ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultAbciInfo {
    pub response: ResponseInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultAbciQuery {
    pub response: ResponseQuery,
}

/// Options for `abci_query_with_options`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciQueryOptions {
    /// 0 queries the latest state.
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub prove: bool,
}

// ── Blocks ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBlock {
    pub block_id: BlockHash,
    pub block: Block,
}

impl From<Block> for ResultBlock {
    fn from(block: Block) -> Self {
        Self {
            block_id: block.hash(),
            block,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBlockResults {
    pub height: u64,
    pub txs_results: Vec<ResponseDeliverTx>,
    pub begin_block_events: Vec<AbciEvent>,
    pub end_block_events: Vec<AbciEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_result_copies_check_fields() {
        let check = ResponseCheckTx::rejected(7, "bad nonce");
        let hash = TxHash::digest(b"tx");
        let res = ResultBroadcastTx::from_check(check, hash);
        assert_eq!(res.code, 7);
        assert_eq!(res.log, "bad nonce");
        assert_eq!(res.hash, hash);
    }

    #[test]
    fn check_tx_result_is_flattened() {
        let res = ResultCheckTx {
            response: ResponseCheckTx::rejected(3, "nope"),
        };
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["code"], 3);
        assert_eq!(json["log"], "nope");
    }

    #[test]
    fn tx_result_omits_missing_proof() {
        let tx = Tx::new(b"abc".to_vec());
        let res = ResultTx {
            hash: tx.hash(),
            height: 4,
            index: 0,
            tx_result: ResponseDeliverTx::default(),
            tx,
            proof: None,
        };
        let json = serde_json::to_value(&res).unwrap();
        assert!(json.get("proof").is_none());
        assert_eq!(json["hash"], res.hash.to_string());
    }
}
