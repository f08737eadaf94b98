//! Node-level events published on the event bus.
//!
//! Every event carries a tag map of `composite.key -> values`, which is what
//! subscription queries are matched against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::abci::ResponseDeliverTx;
use crate::block::Header;
use crate::tx::Tx;

/// Reserved tag holding the event type.
pub const EVENT_TYPE_KEY: &str = "tm.event";
/// Tag holding the upper-hex hash of an included transaction.
pub const TX_HASH_KEY: &str = "tx.hash";
/// Tag holding the height at which a transaction was included.
pub const TX_HEIGHT_KEY: &str = "tx.height";

pub const EVENT_TX: &str = "Tx";
pub const EVENT_NEW_BLOCK_HEADER: &str = "NewBlockHeader";

/// Event tags, ordered so that rendering is deterministic.
pub type Tags = BTreeMap<String, Vec<String>>;

/// Payload of an inclusion event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDataTx {
    pub height: u64,
    pub index: u32,
    pub tx: Tx,
    pub result: ResponseDeliverTx,
}

impl EventDataTx {
    pub fn tags(&self) -> Tags {
        let mut tags = Tags::new();
        for event in &self.result.events {
            for attr in &event.attributes {
                tags.entry(format!("{}.{}", event.kind, attr.key))
                    .or_default()
                    .push(attr.value.clone());
            }
        }
        tags.insert(EVENT_TYPE_KEY.to_string(), vec![EVENT_TX.to_string()]);
        tags.insert(TX_HASH_KEY.to_string(), vec![self.tx.hash().to_string()]);
        tags.insert(TX_HEIGHT_KEY.to_string(), vec![self.height.to_string()]);
        tags
    }
}

/// Typed event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventData {
    Tx(EventDataTx),
    NewBlockHeader { header: Header },
}

impl EventData {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventData::Tx(_) => EVENT_TX,
            EventData::NewBlockHeader { .. } => EVENT_NEW_BLOCK_HEADER,
        }
    }

    pub fn tags(&self) -> Tags {
        match self {
            EventData::Tx(data) => data.tags(),
            EventData::NewBlockHeader { header } => {
                let mut tags = Tags::new();
                tags.insert(EVENT_TYPE_KEY.to_string(), vec![self.event_type().to_string()]);
                tags.insert("block.height".to_string(), vec![header.height.to_string()]);
                tags
            }
        }
    }
}
