//! Nullable mempool: programmable validation results, recorded calls.

use std::sync::Mutex;

use tessel_rpc::{CheckTxReceipt, Mempool, MempoolError};
use tessel_types::{ResponseCheckTx, Tx, TxKey};
use tokio::sync::oneshot;

struct Inner {
    txs: Vec<(TxKey, Tx)>,
    max_txs: usize,
    response: ResponseCheckTx,
    refusal: Option<MempoolError>,
    removal_failure: Option<MempoolError>,
    hold: bool,
    pending: Vec<(oneshot::Sender<ResponseCheckTx>, ResponseCheckTx)>,
    submitted: Vec<Tx>,
    removed: Vec<TxKey>,
}

/// An in-memory mempool for testing.
///
/// Accepts everything with an OK result by default. Accepted transactions
/// are kept in submission order.
pub struct NullMempool {
    inner: Mutex<Inner>,
}

impl NullMempool {
    pub fn new() -> Self {
        Self::with_capacity(5000)
    }

    pub fn with_capacity(max_txs: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                txs: Vec::new(),
                max_txs,
                response: ResponseCheckTx::ok(),
                refusal: None,
                removal_failure: None,
                hold: false,
                pending: Vec::new(),
                submitted: Vec::new(),
                removed: Vec::new(),
            }),
        }
    }

    /// Answer every following check with `response`.
    pub fn respond_with(&self, response: ResponseCheckTx) {
        self.inner.lock().unwrap().response = response;
    }

    /// Refuse the next submission outright.
    pub fn refuse_next(&self, err: MempoolError) {
        self.inner.lock().unwrap().refusal = Some(err);
    }

    /// Make `remove_tx_by_key` fail with `err`.
    pub fn fail_removal(&self, err: MempoolError) {
        self.inner.lock().unwrap().removal_failure = Some(err);
    }

    /// Hold validation results until [`release_results`](Self::release_results).
    pub fn hold_results(&self) {
        self.inner.lock().unwrap().hold = true;
    }

    pub fn release_results(&self) {
        let pending = {
            let mut inner = self.inner.lock().unwrap();
            inner.hold = false;
            std::mem::take(&mut inner.pending)
        };
        for (tx, response) in pending {
            let _ = tx.send(response);
        }
    }

    /// Every transaction passed to `check_tx`, refused ones excluded.
    pub fn submitted(&self) -> Vec<Tx> {
        self.inner.lock().unwrap().submitted.clone()
    }

    /// Keys passed to `remove_tx_by_key`, successful or not.
    pub fn removed(&self) -> Vec<TxKey> {
        self.inner.lock().unwrap().removed.clone()
    }

    pub fn contains(&self, key: &TxKey) -> bool {
        self.inner.lock().unwrap().txs.iter().any(|(k, _)| k == key)
    }
}

impl Default for NullMempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool for NullMempool {
    fn check_tx(&self, tx: &Tx) -> Result<CheckTxReceipt, MempoolError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.refusal.take() {
            return Err(err);
        }
        let key = tx.key();
        if inner.txs.iter().any(|(k, _)| *k == key) {
            return Err(MempoolError::AlreadyInCache);
        }
        if inner.txs.len() >= inner.max_txs {
            return Err(MempoolError::Full {
                size: inner.txs.len(),
                max: inner.max_txs,
            });
        }

        inner.submitted.push(tx.clone());
        let response = inner.response.clone();
        if response.is_ok() {
            inner.txs.push((key, tx.clone()));
        }

        let (result_tx, result_rx) = oneshot::channel();
        if inner.hold {
            inner.pending.push((result_tx, response));
        } else {
            let _ = result_tx.send(response);
        }
        Ok(result_rx)
    }

    fn remove_tx_by_key(&self, key: &TxKey) -> Result<(), MempoolError> {
        let mut inner = self.inner.lock().unwrap();
        inner.removed.push(*key);
        if let Some(err) = inner.removal_failure.clone() {
            return Err(err);
        }
        let before = inner.txs.len();
        inner.txs.retain(|(k, _)| k != key);
        if inner.txs.len() == before {
            return Err(MempoolError::NotFound);
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.inner.lock().unwrap().txs.len()
    }

    fn txs_bytes(&self) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .txs
            .iter()
            .map(|(_, tx)| tx.len() as u64)
            .sum()
    }

    fn reap_max_txs(&self, max: usize) -> Vec<Tx> {
        self.inner
            .lock()
            .unwrap()
            .txs
            .iter()
            .take(max)
            .map(|(_, tx)| tx.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepted_txs_are_kept() {
        let mempool = NullMempool::new();
        let tx = Tx::new(b"a".to_vec());
        let result = mempool.check_tx(&tx).unwrap().await.unwrap();
        assert!(result.is_ok());
        assert!(mempool.contains(&tx.key()));
        assert_eq!(mempool.size(), 1);
        assert_eq!(mempool.txs_bytes(), 1);
    }

    #[tokio::test]
    async fn rejected_txs_are_not_kept() {
        let mempool = NullMempool::new();
        mempool.respond_with(ResponseCheckTx::rejected(2, "bad"));
        let tx = Tx::new(b"a".to_vec());
        let result = mempool.check_tx(&tx).unwrap().await.unwrap();
        assert_eq!(result.code, 2);
        assert_eq!(mempool.size(), 0);
    }

    #[test]
    fn duplicate_is_refused() {
        let mempool = NullMempool::new();
        let tx = Tx::new(b"a".to_vec());
        mempool.check_tx(&tx).unwrap();
        assert!(matches!(
            mempool.check_tx(&tx),
            Err(MempoolError::AlreadyInCache)
        ));
    }

    #[test]
    fn full_pool_is_refused() {
        let mempool = NullMempool::with_capacity(1);
        mempool.check_tx(&Tx::new(b"a".to_vec())).unwrap();
        assert!(matches!(
            mempool.check_tx(&Tx::new(b"b".to_vec())),
            Err(MempoolError::Full { size: 1, max: 1 })
        ));
    }

    #[test]
    fn remove_by_key() {
        let mempool = NullMempool::new();
        let tx = Tx::new(b"a".to_vec());
        mempool.check_tx(&tx).unwrap();
        mempool.remove_tx_by_key(&tx.key()).unwrap();
        assert!(!mempool.contains(&tx.key()));
        assert_eq!(mempool.removed(), vec![tx.key()]);
        assert_eq!(
            mempool.remove_tx_by_key(&tx.key()),
            Err(MempoolError::NotFound)
        );
    }

    #[tokio::test]
    async fn held_results_arrive_on_release() {
        let mempool = NullMempool::new();
        mempool.hold_results();
        let mut receipt = mempool.check_tx(&Tx::new(b"a".to_vec())).unwrap();
        assert!(receipt.try_recv().is_err());
        mempool.release_results();
        assert!(receipt.await.unwrap().is_ok());
    }
}
