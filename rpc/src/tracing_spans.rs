//! Span constructors shared by the RPC entry points.
//!
//! Consistent span names and field sets make it easy to correlate a
//! broadcast with the subscription that watches it.

use tessel_types::TxHash;
use tracing::{info_span, Span};

/// Span covering a single RPC method call.
pub fn rpc_span(method: &str) -> Span {
    info_span!("rpc", method = %method)
}

/// Span covering one broadcast of a transaction.
pub fn broadcast_span(mode: &str, hash: &TxHash) -> Span {
    info_span!("broadcast_tx", mode = %mode, hash = %hash)
}

/// Span covering the lifetime of a subscription forwarder.
pub fn subscription_span(subscriber: &str, query: &str) -> Span {
    info_span!("subscription", subscriber = %subscriber, query = %query)
}
