//! Fundamental types for the Tessel node.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! transactions and their content hashes, application (ABCI-style) results,
//! bus events, block headers, the genesis document and peer descriptors.

pub mod abci;
pub mod block;
pub mod error;
pub mod event;
pub mod genesis;
pub mod hash;
pub mod merkle;
pub mod peer;
pub mod tx;

pub use abci::{
    AbciEvent, EventAttribute, RequestQuery, ResponseCheckTx, ResponseDeliverTx, ResponseInfo,
    ResponseQuery, CODE_TYPE_OK,
};
pub use block::{Block, BlockHash, BlockResponses, Header};
pub use error::TypesError;
pub use event::{EventData, EventDataTx, Tags};
pub use genesis::GenesisDoc;
pub use hash::{sha256, TxHash};
pub use peer::PeerInfo;
pub use merkle::MerkleProof;
pub use tx::{txs_root, Tx, TxKey, TxProof, TxResult};
