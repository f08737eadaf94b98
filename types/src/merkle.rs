//! Binary Merkle tree over transaction hashes, with inclusion proofs.
//!
//! Leaves are hashed as `sha256(0x00 || leaf)` and inner nodes as
//! `sha256(0x01 || left || right)`. A tree of `n` leaves splits at the
//! largest power of two strictly below `n`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;

pub fn leaf_hash(leaf: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf);
    hasher.finalize().into()
}

pub fn inner_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([INNER_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn split_point(n: usize) -> usize {
    debug_assert!(n > 1);
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

fn root_of_leaves(leaves: &[[u8; 32]]) -> [u8; 32] {
    match leaves.len() {
        0 => Sha256::digest([]).into(),
        1 => leaves[0],
        n => {
            let k = split_point(n);
            inner_hash(&root_of_leaves(&leaves[..k]), &root_of_leaves(&leaves[k..]))
        }
    }
}

/// Merkle root of `items`. The root of an empty list is `sha256("")`.
pub fn root<T: AsRef<[u8]>>(items: &[T]) -> [u8; 32] {
    let leaves: Vec<[u8; 32]> = items.iter().map(|i| leaf_hash(i.as_ref())).collect();
    root_of_leaves(&leaves)
}

/// Proof that one leaf is part of a tree. `aunts` run from the leaf level
/// up to just below the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub total: u64,
    pub index: u64,
    pub leaf_hash: [u8; 32],
    pub aunts: Vec<[u8; 32]>,
}

impl MerkleProof {
    /// Build the proof for `items[index]`.
    pub fn new<T: AsRef<[u8]>>(items: &[T], index: usize) -> Option<Self> {
        if index >= items.len() {
            return None;
        }
        let leaves: Vec<[u8; 32]> = items.iter().map(|i| leaf_hash(i.as_ref())).collect();
        let mut aunts = Vec::new();
        collect_aunts(&leaves, index, &mut aunts);
        Some(Self {
            total: items.len() as u64,
            index: index as u64,
            leaf_hash: leaves[index],
            aunts,
        })
    }

    pub fn compute_root(&self) -> Option<[u8; 32]> {
        compute_root(self.index, self.total, self.leaf_hash, &self.aunts)
    }

    /// Check that `leaf` is committed to by `root`.
    pub fn verify(&self, root: &[u8; 32], leaf: &[u8]) -> bool {
        self.leaf_hash == leaf_hash(leaf) && self.compute_root().as_ref() == Some(root)
    }
}

fn collect_aunts(leaves: &[[u8; 32]], index: usize, aunts: &mut Vec<[u8; 32]>) {
    if leaves.len() <= 1 {
        return;
    }
    let k = split_point(leaves.len());
    if index < k {
        collect_aunts(&leaves[..k], index, aunts);
        aunts.push(root_of_leaves(&leaves[k..]));
    } else {
        collect_aunts(&leaves[k..], index - k, aunts);
        aunts.push(root_of_leaves(&leaves[..k]));
    }
}

fn compute_root(index: u64, total: u64, leaf: [u8; 32], aunts: &[[u8; 32]]) -> Option<[u8; 32]> {
    if index >= total {
        return None;
    }
    match total {
        0 => None,
        1 => aunts.is_empty().then_some(leaf),
        _ => {
            let (top, rest) = aunts.split_last()?;
            let k = split_point(total as usize) as u64;
            if index < k {
                let left = compute_root(index, k, leaf, rest)?;
                Some(inner_hash(&left, top))
            } else {
                let right = compute_root(index - k, total - k, leaf, rest)?;
                Some(inner_hash(top, &right))
            }
        }
    }
}
