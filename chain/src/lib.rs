//! Chain accessor consumed by block synchronization.
//!
//! The synchronizer never owns chain storage. It reads the current head,
//! asks the chain to check seals and hands validated blocks over for
//! insertion. Everything else (execution, fork choice, persistence) stays
//! behind this trait.

pub mod config;
pub mod memory;

pub use config::{ChainConfig, ChainKind, SEAL_RELAXATION_DIVISOR};
pub use memory::MemoryChain;

use containers::{Block, BlockHeader, Bytes32};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("unknown parent {parent} for block {number}")]
    UnknownParent { number: u64, parent: Bytes32 },

    #[error("block {number} does not follow its parent at {parent_number}")]
    InvalidNumber { number: u64, parent_number: u64 },

    #[error("body root mismatch for block {number}: header commits to {expected}, body hashes to {actual}")]
    BodyRootMismatch {
        number: u64,
        expected: Bytes32,
        actual: Bytes32,
    },

    #[error("insufficient seal work for block {number}: {actual} bits, {required} required")]
    InvalidSeal {
        number: u64,
        required: u32,
        actual: u32,
    },
}

/// Accessor over a local chain replica.
///
/// Implementations enforce their own consistency; every call is treated as
/// atomic by callers.
pub trait Chain: Send + Sync {
    /// Current head of the canonical chain.
    fn current_header(&self) -> BlockHeader;

    /// Insert a block. Re-inserting a known block succeeds without effect.
    fn add_block(&self, block: Block) -> Result<(), ChainError>;

    /// Check the consensus seal of a header. With `full_consensus` unset the
    /// check may be relaxed; strict checks are re-applied by `add_block`.
    fn validate_seal(&self, header: &BlockHeader, full_consensus: bool) -> Result<(), ChainError>;

    fn header_by_hash(&self, hash: &Bytes32) -> Option<BlockHeader>;

    /// Header at `number` on the canonical chain.
    fn header_by_number(&self, number: u64) -> Option<BlockHeader>;

    fn block_by_hash(&self, hash: &Bytes32) -> Option<Block>;

    fn contains(&self, hash: &Bytes32) -> bool {
        self.header_by_hash(hash).is_some()
    }
}
