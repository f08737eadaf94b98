//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use tessel_rpc::RpcConfig;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a Tessel node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// RPC limits, timeouts and listener.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Data availability backend.
    #[serde(default)]
    pub da: DaConfig,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Which DA backend to construct, and its backend-specific JSON config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaConfig {
    #[serde(default = "default_da_layer")]
    pub layer: String,

    /// Passed verbatim to the backend's `init`. Empty means defaults.
    #[serde(default)]
    pub config: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_da_layer() -> String {
    "mock".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            da: DaConfig::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DaConfig {
    fn default() -> Self {
        Self {
            layer: default_da_layer(),
            config: String::new(),
        }
    }
}
