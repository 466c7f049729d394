//! In-memory chain replica.
//!
//! Stores every accepted block indexed by hash and keeps a canonical
//! number -> hash index for the longest chain. Used by the simulator binary
//! and as the accessor in sync tests.

use std::collections::{BTreeMap, HashMap};

use containers::{Block, BlockHeader, Bytes32};
use parking_lot::RwLock;
use tracing::info;

use crate::{Chain, ChainConfig, ChainError};

#[derive(Debug)]
pub struct MemoryChain {
    config: ChainConfig,
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// All known blocks, indexed by block hash
    blocks: HashMap<Bytes32, Block>,

    /// Canonical chain (number -> hash), genesis up to head
    canonical: BTreeMap<u64, Bytes32>,

    head: Bytes32,
}

impl MemoryChain {
    /// Create a chain seeded with `genesis`. The genesis seal is trusted.
    pub fn new(config: ChainConfig, genesis: Block) -> Self {
        let hash = genesis.hash();
        let number = genesis.number();

        let mut blocks = HashMap::new();
        blocks.insert(hash, genesis);

        Self {
            config,
            inner: RwLock::new(Inner {
                blocks,
                canonical: BTreeMap::from([(number, hash)]),
                head: hash,
            }),
        }
    }

    /// Number of blocks stored, including side-chain blocks.
    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }

    /// Canonical headers in ascending order.
    pub fn canonical_headers(&self) -> Vec<BlockHeader> {
        let inner = self.inner.read();
        inner
            .canonical
            .values()
            .filter_map(|hash| inner.blocks.get(hash))
            .map(|block| block.header.clone())
            .collect()
    }

    fn check_seal(&self, header: &BlockHeader, full_consensus: bool) -> Result<(), ChainError> {
        let required = self
            .config
            .required_seal_bits(header.difficulty, full_consensus);
        let actual = header.pow_hash().leading_zero_bits();
        if actual < required {
            return Err(ChainError::InvalidSeal {
                number: header.number,
                required,
                actual,
            });
        }
        Ok(())
    }
}

impl Inner {
    fn head_header(&self) -> &BlockHeader {
        // head always points at a stored block
        &self.blocks[&self.head].header
    }

    /// Re-point the canonical index at a new, higher `tip`, walking back
    /// until the existing index agrees.
    fn set_head(&mut self, tip: Bytes32) {
        let mut cursor = tip;
        while let Some(block) = self.blocks.get(&cursor) {
            let number = block.number();
            if self.canonical.get(&number) == Some(&cursor) {
                break;
            }
            self.canonical.insert(number, cursor);
            cursor = block.header.parent_hash;
        }
        self.head = tip;
    }
}

impl Chain for MemoryChain {
    fn current_header(&self) -> BlockHeader {
        self.inner.read().head_header().clone()
    }

    fn add_block(&self, block: Block) -> Result<(), ChainError> {
        let hash = block.hash();
        let number = block.number();

        self.check_seal(&block.header, true)?;

        let body_root = block.body.root();
        if body_root != block.header.body_root {
            return Err(ChainError::BodyRootMismatch {
                number,
                expected: block.header.body_root,
                actual: body_root,
            });
        }

        let mut inner = self.inner.write();
        if inner.blocks.contains_key(&hash) {
            return Ok(());
        }

        let parent_hash = block.header.parent_hash;
        let parent_number = match inner.blocks.get(&parent_hash) {
            Some(parent) => parent.number(),
            None => {
                return Err(ChainError::UnknownParent {
                    number,
                    parent: parent_hash,
                });
            }
        };
        if number != parent_number + 1 {
            return Err(ChainError::InvalidNumber {
                number,
                parent_number,
            });
        }

        inner.blocks.insert(hash, block);

        if number > inner.head_header().number {
            let reorg = parent_hash != inner.head;
            inner.set_head(hash);
            if reorg {
                info!(kind = %self.config.kind, number, hash = %hash, "Switched to heavier fork");
            }
        }

        Ok(())
    }

    fn validate_seal(&self, header: &BlockHeader, full_consensus: bool) -> Result<(), ChainError> {
        self.check_seal(header, full_consensus)
    }

    fn header_by_hash(&self, hash: &Bytes32) -> Option<BlockHeader> {
        self.inner
            .read()
            .blocks
            .get(hash)
            .map(|block| block.header.clone())
    }

    fn header_by_number(&self, number: u64) -> Option<BlockHeader> {
        let inner = self.inner.read();
        inner
            .canonical
            .get(&number)
            .and_then(|hash| inner.blocks.get(hash))
            .map(|block| block.header.clone())
    }

    fn block_by_hash(&self, hash: &Bytes32) -> Option<Block> {
        self.inner.read().blocks.get(hash).cloned()
    }

    fn contains(&self, hash: &Bytes32) -> bool {
        self.inner.read().blocks.contains_key(hash)
    }
}
