//! Limits and timeouts for the RPC layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the RPC client and its optional HTTP listener.
///
/// Lives under the `[rpc]` table of the node's TOML file. Every field has a
/// default, so an empty table is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Maximum number of distinct subscribers on the event bus.
    #[serde(default = "default_max_subscription_clients")]
    pub max_subscription_clients: usize,

    /// Maximum number of subscriptions a single subscriber may hold.
    #[serde(default = "default_max_subscriptions_per_client")]
    pub max_subscriptions_per_client: usize,

    /// How long `broadcast_tx_commit` waits for block inclusion.
    #[serde(default = "default_timeout_broadcast_tx_commit_ms")]
    pub timeout_broadcast_tx_commit_ms: u64,

    /// Upper bound for the delay between resubscription attempts.
    #[serde(default = "default_resubscribe_max_backoff_ms")]
    pub resubscribe_max_backoff_ms: u64,

    /// Whether to serve JSON-RPC over HTTP.
    #[serde(default)]
    pub enable_http: bool,

    /// HTTP listen address, used when `enable_http` is set.
    #[serde(default = "default_laddr")]
    pub laddr: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_subscription_clients() -> usize {
    100
}

fn default_max_subscriptions_per_client() -> usize {
    5
}

fn default_timeout_broadcast_tx_commit_ms() -> u64 {
    10_000
}

fn default_resubscribe_max_backoff_ms() -> u64 {
    10_000
}

fn default_laddr() -> String {
    "127.0.0.1:26657".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl RpcConfig {
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_broadcast_tx_commit_ms)
    }

    pub fn resubscribe_max_backoff(&self) -> Duration {
        Duration::from_millis(self.resubscribe_max_backoff_ms)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_subscription_clients: default_max_subscription_clients(),
            max_subscriptions_per_client: default_max_subscriptions_per_client(),
            timeout_broadcast_tx_commit_ms: default_timeout_broadcast_tx_commit_ms(),
            resubscribe_max_backoff_ms: default_resubscribe_max_backoff_ms(),
            enable_http: false,
            laddr: default_laddr(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let config: RpcConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RpcConfig::default());
        assert_eq!(config.commit_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_subscription_clients, 100);
        assert_eq!(config.max_subscriptions_per_client, 5);
    }

    #[test]
    fn partial_override() {
        let config: RpcConfig =
            serde_json::from_str(r#"{"timeout_broadcast_tx_commit_ms": 250}"#).unwrap();
        assert_eq!(config.commit_timeout(), Duration::from_millis(250));
        assert_eq!(config.resubscribe_max_backoff(), Duration::from_secs(10));
    }
}
