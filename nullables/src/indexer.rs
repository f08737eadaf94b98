//! In-memory transaction indexer.

use std::sync::Mutex;

use async_trait::async_trait;
use tessel_pubsub::Query;
use tessel_rpc::{IndexError, TxIndexer};
use tessel_types::{EventDataTx, TxHash, TxResult};

/// Keeps indexed results in insertion order and answers searches by
/// matching the query against each result's event tags.
pub struct NullTxIndexer {
    results: Mutex<Vec<TxResult>>,
    disabled: bool,
}

impl NullTxIndexer {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            disabled: false,
        }
    }

    /// An indexer that refuses every lookup, like a node with indexing off.
    pub fn disabled() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            disabled: true,
        }
    }

    pub fn index(&self, result: TxResult) {
        self.results.lock().unwrap().push(result);
    }
}

impl Default for NullTxIndexer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TxIndexer for NullTxIndexer {
    async fn get(&self, hash: &TxHash) -> Result<Option<TxResult>, IndexError> {
        if self.disabled {
            return Err(IndexError::Disabled);
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.tx.hash() == *hash)
            .cloned())
    }

    async fn search(&self, query: &Query) -> Result<Vec<TxResult>, IndexError> {
        if self.disabled {
            return Err(IndexError::Disabled);
        }
        let results = self.results.lock().unwrap();
        Ok(results
            .iter()
            .filter(|r| {
                let event = EventDataTx {
                    height: r.height,
                    index: r.index,
                    tx: r.tx.clone(),
                    result: r.result.clone(),
                };
                query.matches(&event.tags())
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_types::{ResponseDeliverTx, Tx};

    fn result(height: u64, payload: &[u8]) -> TxResult {
        TxResult {
            height,
            index: 0,
            tx: Tx::new(payload.to_vec()),
            result: ResponseDeliverTx::default(),
        }
    }

    #[tokio::test]
    async fn search_matches_tags() {
        let indexer = NullTxIndexer::new();
        indexer.index(result(1, b"a"));
        indexer.index(result(2, b"b"));
        indexer.index(result(3, b"c"));

        let query = Query::parse("tx.height >= 2").unwrap();
        let found = indexer.search(&query).await.unwrap();
        let heights: Vec<u64> = found.iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![2, 3]);
    }

    #[tokio::test]
    async fn get_by_hash() {
        let indexer = NullTxIndexer::new();
        let r = result(1, b"a");
        indexer.index(r.clone());
        assert_eq!(indexer.get(&r.tx.hash()).await.unwrap(), Some(r));
        let missing = Tx::new(b"z".to_vec()).hash();
        assert_eq!(indexer.get(&missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn disabled_indexer_refuses() {
        let indexer = NullTxIndexer::disabled();
        let query = Query::parse("tx.height > 0").unwrap();
        assert_eq!(indexer.search(&query).await, Err(IndexError::Disabled));
    }
}
