//! Query surface of the client: search, lookups, blocks and unsupported
//! methods.

mod common;

use common::Harness;
use tessel_nullables::app::CODE_UNKNOWN_PATH;
use tessel_rpc::{Mempool, RpcError, StoreError};
use tessel_types::{
    txs_root, Block, BlockResponses, GenesisDoc, Header, ResponseCheckTx, ResponseDeliverTx, Tx,
    TxResult,
};

fn hit(height: u64, index: u32) -> TxResult {
    TxResult {
        height,
        index,
        tx: Tx::new(format!("h{height}i{index}").into_bytes()),
        result: ResponseDeliverTx::default(),
    }
}

fn block(height: u64, txs: Vec<Tx>) -> Block {
    Block {
        header: Header {
            chain_id: "tessel-test".into(),
            height,
            time: 1_700_000_000_000_000_000 + height,
            data_hash: txs_root(&txs),
            app_hash: [height as u8; 32],
            ..Default::default()
        },
        txs,
    }
}

// ---------------------------------------------------------------------------
// tx_search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_sorts_by_height_then_index() {
    let h = Harness::new();
    for r in [hit(5, 2), hit(5, 1), hit(7, 0)] {
        h.nulls.indexer.index(r);
    }

    let asc = h
        .client
        .tx_search("tx.height > 0", false, None, None, "asc")
        .await
        .unwrap();
    let keys: Vec<_> = asc.txs.iter().map(|t| (t.height, t.index)).collect();
    assert_eq!(keys, vec![(5, 1), (5, 2), (7, 0)]);

    let desc = h
        .client
        .tx_search("tx.height > 0", false, None, None, "desc")
        .await
        .unwrap();
    let keys: Vec<_> = desc.txs.iter().map(|t| (t.height, t.index)).collect();
    assert_eq!(keys, vec![(7, 0), (5, 2), (5, 1)]);
}

#[tokio::test]
async fn search_rejects_unknown_order() {
    let h = Harness::new();
    h.nulls.indexer.index(hit(1, 0));
    let err = h
        .client
        .tx_search("tx.height > 0", false, None, None, "foo")
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::InvalidOrderToken(ref t) if t == "foo"));
}

#[tokio::test]
async fn search_paginates_after_sorting() {
    let h = Harness::new();
    // Insert in reverse so that only a sort-then-slice yields 31..=45.
    for height in (1..=45).rev() {
        h.nulls.indexer.index(hit(height, 0));
    }

    let page = h
        .client
        .tx_search("tx.height > 0", false, Some(2), Some(30), "asc")
        .await
        .unwrap();
    assert_eq!(page.total_count, 45);
    assert_eq!(page.txs.len(), 15);
    assert_eq!(page.txs[0].height, 31);
    assert_eq!(page.txs[14].height, 45);

    let err = h
        .client
        .tx_search("tx.height > 0", false, Some(3), Some(30), "asc")
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::PaginationRange { pages: 2, given: 3 }));
    assert!(err.to_string().contains("[1, 2]"));
}

#[tokio::test]
async fn empty_search_is_one_empty_page() {
    let h = Harness::new();
    for page in [None, Some(1)] {
        let res = h
            .client
            .tx_search("tx.height > 0", false, page, Some(7), "")
            .await
            .unwrap();
        assert_eq!(res.total_count, 0);
        assert!(res.txs.is_empty());
    }
}

#[tokio::test]
async fn search_with_bad_query() {
    let h = Harness::new();
    let err = h
        .client
        .tx_search("tx.height >>> 1", false, None, None, "")
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Query(_)));
}

// ---------------------------------------------------------------------------
// tx lookup and proofs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tx_lookup_with_proof() {
    let h = Harness::new();
    let txs: Vec<Tx> = ["a", "b", "c"].iter().map(|s| Tx::new(s.as_bytes().to_vec())).collect();
    let b = block(1, txs.clone());
    h.nulls.store.put_block(b.clone(), BlockResponses::default());
    h.nulls.indexer.index(TxResult {
        height: 1,
        index: 1,
        tx: txs[1].clone(),
        result: ResponseDeliverTx::default(),
    });

    let res = h.client.tx(txs[1].hash().as_bytes(), true).await.unwrap();
    assert_eq!(res.hash, txs[1].hash());
    assert_eq!(res.index, 1);
    let proof = res.proof.expect("proof requested");
    assert_eq!(proof.root_hash, b.header.data_hash);
    assert!(proof.verify());

    let res = h.client.tx(txs[1].hash().as_bytes(), false).await.unwrap();
    assert!(res.proof.is_none());
}

#[tokio::test]
async fn tx_lookup_misses() {
    let h = Harness::new();
    let missing = Tx::new(b"nope".to_vec()).hash();
    let err = h.client.tx(missing.as_bytes(), false).await.unwrap_err();
    assert!(matches!(err, RpcError::NotFound(_)));

    let err = h.client.tx(&[1, 2, 3], false).await.unwrap_err();
    assert!(matches!(err, RpcError::InvalidRequest(_)));
}

// ---------------------------------------------------------------------------
// blocks and status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_tracks_latest_block() {
    let h = Harness::new();
    let empty = h.client.status().await.unwrap();
    assert_eq!(empty.sync_info.latest_block_height, 0);

    let b = block(3, vec![]);
    h.nulls.store.put_block(b.clone(), BlockResponses::default());
    let status = h.client.status().await.unwrap();
    assert_eq!(status.sync_info.latest_block_height, 3);
    assert_eq!(status.sync_info.latest_block_hash, b.hash());
    assert_eq!(status.sync_info.latest_app_hash, vec![3u8; 32]);
}

#[tokio::test]
async fn block_queries() {
    let h = Harness::new();
    let one = block(1, vec![Tx::new(b"x".to_vec())]);
    let two = block(2, vec![]);
    h.nulls.store.put_block(one.clone(), BlockResponses::default());
    h.nulls.store.put_block(
        two.clone(),
        BlockResponses {
            deliver_txs: vec![ResponseDeliverTx::default()],
            ..Default::default()
        },
    );

    assert_eq!(h.client.block(None).await.unwrap().block, two);
    assert_eq!(h.client.block(Some(1)).await.unwrap().block, one);
    assert!(matches!(
        h.client.block(Some(9)).await,
        Err(RpcError::InvalidRequest(_))
    ));

    let by_hash = h.client.block_by_hash(one.hash().as_bytes()).await.unwrap();
    assert_eq!(by_hash.block_id, one.hash());

    let results = h.client.block_results(None).await.unwrap();
    assert_eq!(results.height, 2);
    assert_eq!(results.txs_results.len(), 1);
}

#[tokio::test]
async fn genesis_comes_from_the_store() {
    let h = Harness::new();
    let genesis = GenesisDoc {
        genesis_time: 1_700_000_000_000_000_000,
        initial_height: 10,
        app_state: br#"{"accounts":[]}"#.to_vec(),
        ..GenesisDoc::new("tessel-main")
    };
    h.nulls.store.set_genesis(genesis.clone());
    assert_eq!(h.client.genesis().await.unwrap().genesis, genesis);

    h.nulls.store.forget_genesis();
    assert!(matches!(
        h.client.genesis().await,
        Err(RpcError::Store(StoreError::NotFound(_)))
    ));
}

// ---------------------------------------------------------------------------
// mempool, app and network
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unconfirmed_txs_respects_limit() {
    let h = Harness::new();
    for i in 0..5u8 {
        h.nulls.mempool.check_tx(&Tx::new(vec![i])).unwrap();
    }
    let res = h.client.unconfirmed_txs(Some(2)).await.unwrap();
    assert_eq!(res.count, 2);
    assert_eq!(res.total, 5);
    assert_eq!(res.total_bytes, 5);

    let num = h.client.num_unconfirmed_txs().await.unwrap();
    assert_eq!(num.total, 5);
    assert!(num.txs.is_empty());
}

#[tokio::test]
async fn check_tx_does_not_touch_mempool() {
    let h = Harness::new();
    h.nulls
        .app
        .set_check_response(ResponseCheckTx::rejected(3, "bad"));
    let res = h.client.check_tx(Tx::new(b"a".to_vec())).await.unwrap();
    assert_eq!(res.response.code, 3);
    assert_eq!(h.nulls.app.checked().len(), 1);
    assert!(h.nulls.mempool.submitted().is_empty());
}

#[tokio::test]
async fn abci_query_goes_to_app() {
    let h = Harness::new();
    h.nulls.app.store("/accounts", b"100".to_vec());
    let res = h.client.abci_query("/accounts", b"alice").await.unwrap();
    assert_eq!(res.response.value, b"100".to_vec());
    assert_eq!(res.response.key, b"alice".to_vec());

    let res = h.client.abci_query("/missing", b"").await.unwrap();
    assert_eq!(res.response.code, CODE_UNKNOWN_PATH);
}

#[tokio::test]
async fn app_failure_is_an_error() {
    let h = Harness::new();
    h.nulls.app.go_offline();
    assert!(matches!(
        h.client.abci_info().await,
        Err(RpcError::App(_))
    ));
}

#[tokio::test]
async fn net_info_lists_peers() {
    let h = Harness::new();
    h.nulls.p2p.add_peer(tessel_types::PeerInfo {
        node_id: "peer-1".into(),
        ..Default::default()
    });
    let info = h.client.net_info().await.unwrap();
    assert_eq!(info.n_peers, 1);
    assert!(!info.listeners.is_empty());
}

// ---------------------------------------------------------------------------
// unsupported
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsupported_methods_return_errors() {
    let h = Harness::new();
    let c = &h.client;
    let results = [
        c.genesis_chunked(0).await,
        c.blockchain_info(1, 2).await,
        c.consensus_params(None).await,
        c.commit(None).await,
        c.validators(None, None, None).await,
        c.block_search("block.height > 1", None, None, "").await,
        c.broadcast_evidence(b"ev").await,
        c.dump_consensus_state().await,
        c.consensus_state().await,
    ];
    for res in results {
        assert!(matches!(res, Err(RpcError::UnsupportedOperation(_))));
    }

    // The node keeps serving afterwards.
    assert!(c.health().await.is_ok());
}
