//! Prometheus metrics for the RPC layer.
//!
//! [`RpcMetrics`] owns a dedicated [`Registry`] so the node can expose it
//! next to its own collectors.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

pub struct RpcMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Broadcast requests, labelled by mode (`async`, `sync`, `commit`).
    pub broadcasts: IntCounterVec,
    /// Transactions accepted locally whose gossip then failed.
    pub gossip_failures: IntCounter,
    /// Successful mempool rollbacks after a gossip failure.
    pub mempool_rollbacks: IntCounter,
    pub commit_timeouts: IntCounter,
    pub commit_cancellations: IntCounter,
    /// Failed resubscription attempts.
    pub resubscribe_attempts: IntCounter,
    /// Events dropped because a consumer's output buffer was full.
    pub events_dropped: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Forwarders currently delivering events to consumers.
    pub active_subscriptions: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from submission to observed block inclusion, in milliseconds.
    pub commit_latency_ms: Histogram,
}

impl RpcMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let broadcasts = register_int_counter_vec_with_registry!(
            Opts::new("tessel_rpc_broadcasts_total", "Broadcast requests by mode"),
            &["mode"],
            registry
        )
        .expect("failed to register broadcasts counter");

        let gossip_failures = register_int_counter_with_registry!(
            Opts::new(
                "tessel_rpc_gossip_failures_total",
                "Locally accepted txs that failed to gossip"
            ),
            registry
        )
        .expect("failed to register gossip_failures counter");

        let mempool_rollbacks = register_int_counter_with_registry!(
            Opts::new(
                "tessel_rpc_mempool_rollbacks_total",
                "Txs removed from the mempool after a gossip failure"
            ),
            registry
        )
        .expect("failed to register mempool_rollbacks counter");

        let commit_timeouts = register_int_counter_with_registry!(
            Opts::new(
                "tessel_rpc_commit_timeouts_total",
                "broadcast_tx_commit calls that timed out"
            ),
            registry
        )
        .expect("failed to register commit_timeouts counter");

        let commit_cancellations = register_int_counter_with_registry!(
            Opts::new(
                "tessel_rpc_commit_cancellations_total",
                "broadcast_tx_commit calls whose subscription was cancelled"
            ),
            registry
        )
        .expect("failed to register commit_cancellations counter");

        let resubscribe_attempts = register_int_counter_with_registry!(
            Opts::new(
                "tessel_rpc_resubscribe_failures_total",
                "Failed attempts to re-establish a cancelled subscription"
            ),
            registry
        )
        .expect("failed to register resubscribe_attempts counter");

        let events_dropped = register_int_counter_with_registry!(
            Opts::new(
                "tessel_rpc_events_dropped_total",
                "Events dropped because a consumer buffer was full"
            ),
            registry
        )
        .expect("failed to register events_dropped counter");

        let active_subscriptions = register_int_gauge_with_registry!(
            Opts::new(
                "tessel_rpc_active_subscriptions",
                "Subscriptions currently forwarding events"
            ),
            registry
        )
        .expect("failed to register active_subscriptions gauge");

        // Exponential buckets covering 1 ms to ~16 s.
        let commit_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "tessel_rpc_commit_latency_ms",
                "Time from submission to block inclusion in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register commit_latency_ms histogram");

        Self {
            registry,
            broadcasts,
            gossip_failures,
            mempool_rollbacks,
            commit_timeouts,
            commit_cancellations,
            resubscribe_attempts,
            events_dropped,
            active_subscriptions,
            commit_latency_ms,
        }
    }

    pub(crate) fn record_broadcast(&self, mode: &str) {
        self.broadcasts.with_label_values(&[mode]).inc();
    }
}

impl Default for RpcMetrics {
    fn default() -> Self {
        Self::new()
    }
}
