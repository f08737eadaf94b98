//! In-memory block store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tessel_rpc::{BlockStore, StoreError};
use tessel_types::{Block, BlockHash, BlockResponses, GenesisDoc};

/// Chain id of the genesis a fresh store reports.
pub const CHAIN_ID: &str = "tessel-test";

/// A block store backed by a `BTreeMap` keyed by height.
pub struct NullBlockStore {
    blocks: Mutex<BTreeMap<u64, (Block, BlockResponses)>>,
    genesis: Mutex<Option<GenesisDoc>>,
}

impl NullBlockStore {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(BTreeMap::new()),
            genesis: Mutex::new(Some(GenesisDoc::new(CHAIN_ID))),
        }
    }

    pub fn set_genesis(&self, genesis: GenesisDoc) {
        *self.genesis.lock().unwrap() = Some(genesis);
    }

    /// Make `genesis` fail as if the document were never written.
    pub fn forget_genesis(&self) {
        *self.genesis.lock().unwrap() = None;
    }

    /// Store a block and its execution results at the block's height.
    pub fn put_block(&self, block: Block, responses: BlockResponses) {
        self.blocks
            .lock()
            .unwrap()
            .insert(block.height(), (block, responses));
    }
}

impl Default for NullBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for NullBlockStore {
    fn height(&self) -> u64 {
        self.blocks
            .lock()
            .unwrap()
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
    }

    fn load_block(&self, height: u64) -> Result<Block, StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .get(&height)
            .map(|(block, _)| block.clone())
            .ok_or_else(|| StoreError::NotFound(format!("block at height {height}")))
    }

    fn load_block_by_hash(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .values()
            .find(|(block, _)| block.hash() == *hash)
            .map(|(block, _)| block.clone())
            .ok_or_else(|| StoreError::NotFound(format!("block {hash}")))
    }

    fn load_block_responses(&self, height: u64) -> Result<BlockResponses, StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .get(&height)
            .map(|(_, responses)| responses.clone())
            .ok_or_else(|| StoreError::NotFound(format!("block results at height {height}")))
    }

    fn genesis(&self) -> Result<GenesisDoc, StoreError> {
        self.genesis
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::NotFound("genesis document".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_types::Header;

    fn block(height: u64) -> Block {
        Block {
            header: Header {
                height,
                ..Default::default()
            },
            txs: Vec::new(),
        }
    }

    #[test]
    fn empty_store_has_height_zero() {
        let store = NullBlockStore::new();
        assert_eq!(store.height(), 0);
        assert!(matches!(store.load_block(1), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn height_is_highest_block() {
        let store = NullBlockStore::new();
        store.put_block(block(2), BlockResponses::default());
        store.put_block(block(1), BlockResponses::default());
        assert_eq!(store.height(), 2);
    }

    #[test]
    fn load_by_hash() {
        let store = NullBlockStore::new();
        let b = block(3);
        store.put_block(b.clone(), BlockResponses::default());
        assert_eq!(store.load_block_by_hash(&b.hash()).unwrap(), b);
        assert!(store.load_block_by_hash(&block(4).hash()).is_err());
    }

    #[test]
    fn genesis_is_replaceable() {
        let store = NullBlockStore::new();
        assert_eq!(store.genesis().unwrap().chain_id, CHAIN_ID);
        store.set_genesis(GenesisDoc::new("other-chain"));
        assert_eq!(store.genesis().unwrap().chain_id, "other-chain");
        store.forget_genesis();
        assert!(matches!(store.genesis(), Err(StoreError::NotFound(_))));
    }
}
