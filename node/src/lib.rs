//! Tessel node: configuration, logging and the composition root that wires
//! the RPC layer, event bus and data availability backend together.

pub mod config;
pub mod error;
pub mod logging;
pub mod node;

pub use config::{DaConfig, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::Node;
