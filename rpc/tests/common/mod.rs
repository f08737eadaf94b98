//! Shared harness for the RPC integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tessel_nullables::Nullables;
use tessel_pubsub::EventBus;
use tessel_rpc::{Client, RpcConfig, ShutdownController};
use tessel_types::{AbciEvent, EventDataTx, ResponseDeliverTx, Tx};

pub struct Harness {
    pub nulls: Nullables,
    pub bus: Arc<EventBus>,
    pub shutdown: ShutdownController,
    pub client: Arc<Client>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RpcConfig::default())
    }

    pub fn with_config(config: RpcConfig) -> Self {
        let nulls = Nullables::default();
        let bus = Arc::new(EventBus::new());
        let shutdown = ShutdownController::new();
        let client = Arc::new(Client::new(
            nulls.capabilities(),
            bus.clone(),
            &config,
            shutdown.signal(),
        ));
        Self {
            nulls,
            bus,
            shutdown,
            client,
        }
    }
}

/// Inclusion event for `tx` at `height`.
pub fn included(tx: &Tx, height: u64) -> EventDataTx {
    EventDataTx {
        height,
        index: 0,
        tx: tx.clone(),
        result: ResponseDeliverTx {
            data: b"ok".to_vec(),
            events: vec![AbciEvent::new("transfer").with_attribute("amount", "10")],
            ..Default::default()
        },
    }
}

/// Poll `cond` until it holds. Panics after roughly a second of
/// (possibly paused) time.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
