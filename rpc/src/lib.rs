//! Client-facing RPC layer for the Tessel node.
//!
//! - [`Client`]: the node API over capability traits
//! - [`BroadcastCoordinator`]: async, sync and commit transaction broadcast
//! - [`SubscriptionManager`]: admission control, event forwarding and
//!   automatic resubscription
//! - [`pagination`]: deterministic sort and page slicing for search results
//! - [`RpcServer`]: JSON-RPC over HTTP and WebSocket

pub mod broadcast;
pub mod capabilities;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pagination;
pub mod responses;
pub mod server;
pub mod shutdown;
pub mod subscriptions;
pub mod tracing_spans;
pub mod websocket;

pub use broadcast::BroadcastCoordinator;
pub use capabilities::{AppConn, BlockStore, CheckTxReceipt, Mempool, P2p, TxIndexer};
pub use client::{Capabilities, Client};
pub use config::RpcConfig;
pub use error::{AdmissionLimit, AppError, IndexError, MempoolError, P2pError, RpcError, StoreError};
pub use metrics::RpcMetrics;
pub use server::RpcServer;
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use subscriptions::SubscriptionManager;
