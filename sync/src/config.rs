//! Sync task configuration.
//!
//! Batch sizes and limits differ between the root chain and shard chains, so
//! they are passed into each task instead of being compiled in.

use std::fs::File;
use std::io::BufReader;
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::Path;

use anyhow::{Context, Result};
use chain::ChainKind;
use serde::{Deserialize, Serialize};

/// Maximum headers requested from a peer in one root-chain header batch.
pub const ROOT_BLOCK_HEADER_LIST_LIMIT: u64 = 500;

/// Maximum root blocks requested in one body batch.
pub const ROOT_BLOCK_BATCH_SIZE: usize = 100;

/// Maximum headers requested from a peer in one shard-chain header batch.
pub const MINOR_BLOCK_HEADER_LIST_LIMIT: u64 = 100;

/// Maximum shard blocks requested in one body batch.
pub const MINOR_BLOCK_BATCH_SIZE: usize = 50;

/// How far the common ancestor may trail the local root head before the
/// peer's fork is considered too old to follow.
pub const MAX_STALE_ROOT_BLOCK_HEIGHT_DIFF: u64 = 60;

/// Same bound for shard chains, which produce blocks much faster.
pub const MAX_STALE_MINOR_BLOCK_HEIGHT_DIFF: u64 = 22_500;

/// Committed blocks of one header batch between intermediate progress events.
pub const PROGRESS_REPORT_INTERVAL: usize = 100;

const ROOT_HEADER_LIMIT: NonZeroU64 = match NonZeroU64::new(ROOT_BLOCK_HEADER_LIST_LIMIT) {
    Some(x) => x,
    None => panic!(),
};
const ROOT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(ROOT_BLOCK_BATCH_SIZE) {
    Some(x) => x,
    None => panic!(),
};
const MINOR_HEADER_LIMIT: NonZeroU64 = match NonZeroU64::new(MINOR_BLOCK_HEADER_LIST_LIMIT) {
    Some(x) => x,
    None => panic!(),
};
const MINOR_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(MINOR_BLOCK_BATCH_SIZE) {
    Some(x) => x,
    None => panic!(),
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Headers requested per header batch.
    pub header_list_limit: NonZeroU64,
    /// Blocks requested per body batch.
    pub block_batch_size: NonZeroUsize,
    /// Allowed distance between local head and common ancestor.
    pub max_sync_staleness: u64,
}

impl SyncConfig {
    pub fn root() -> Self {
        Self {
            header_list_limit: ROOT_HEADER_LIMIT,
            block_batch_size: ROOT_BATCH_SIZE,
            max_sync_staleness: MAX_STALE_ROOT_BLOCK_HEIGHT_DIFF,
        }
    }

    pub fn shard() -> Self {
        Self {
            header_list_limit: MINOR_HEADER_LIMIT,
            block_batch_size: MINOR_BATCH_SIZE,
            max_sync_staleness: MAX_STALE_MINOR_BLOCK_HEIGHT_DIFF,
        }
    }

    pub fn for_chain(kind: ChainKind) -> Self {
        match kind {
            ChainKind::Root => Self::root(),
            ChainKind::Shard(_) => Self::shard(),
        }
    }

    /// Load a YAML config. Zero batch sizes are rejected by deserialization.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open sync config {}", path.display()))?;
        let config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse sync config {}", path.display()))?;
        Ok(config)
    }
}
