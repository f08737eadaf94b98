//! Raw transactions and the indexer's view of an included transaction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::abci::ResponseDeliverTx;
use crate::hash::{sha256, TxHash};
use crate::merkle::{self, MerkleProof};

/// An opaque transaction. The node never interprets the bytes; identity is
/// the content hash.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Tx(Vec<u8>);

impl Tx {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn hash(&self) -> TxHash {
        TxHash::digest(&self.0)
    }

    /// The mempool key for this transaction.
    pub fn key(&self) -> TxKey {
        TxKey::of(self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Tx {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Tx {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx({} bytes, {})", self.0.len(), self.hash())
    }
}

impl Serialize for Tx {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Tx {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map(Tx).map_err(serde::de::Error::custom)
    }
}

/// Key under which the mempool stores a transaction.
///
/// Derived with the same SHA-256 as [`TxHash`], so byte-identical
/// transactions always map to the same mempool entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxKey([u8; 32]);

impl TxKey {
    pub fn of(tx: &Tx) -> Self {
        Self(sha256(tx.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxKey({})", hex::encode_upper(&self.0[..4]))
    }
}

/// A transaction as recorded by the indexer: where it landed and how it
/// executed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub height: u64,
    pub index: u32,
    pub tx: Tx,
    pub result: ResponseDeliverTx,
}

/// Merkle root over the hashes of `txs`, as committed in a block header.
pub fn txs_root(txs: &[Tx]) -> [u8; 32] {
    let hashes: Vec<TxHash> = txs.iter().map(Tx::hash).collect();
    merkle::root(&hashes)
}

/// Proof that a transaction is part of a block's transaction list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxProof {
    pub root_hash: [u8; 32],
    pub data: Tx,
    pub proof: MerkleProof,
}

impl TxProof {
    /// Build the proof for `txs[index]`.
    pub fn new(txs: &[Tx], index: usize) -> Option<Self> {
        let hashes: Vec<TxHash> = txs.iter().map(Tx::hash).collect();
        let proof = MerkleProof::new(&hashes, index)?;
        Some(Self {
            root_hash: merkle::root(&hashes),
            data: txs[index].clone(),
            proof,
        })
    }

    pub fn verify(&self) -> bool {
        self.proof.verify(&self.root_hash, self.data.hash().as_bytes())
    }
}
