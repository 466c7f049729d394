use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::Result;
use chain::Chain;
use containers::{Block, BlockHeader, Bytes32};
use tracing::trace;

/// Peer-facing capabilities a sync task is composed from.
///
/// One implementation exists per chain flavor (root, shard) and per
/// transport. The task itself stays the same; only the source and the
/// [`SyncConfig`](crate::SyncConfig) numbers change.
#[async_trait::async_trait]
pub trait SyncSource: Send + Sync {
    /// Latest header both the local chain and the peer agree on.
    ///
    /// `Ok(None)` means there is no shared history, which is not an error.
    async fn find_ancestor(&self, chain: &dyn Chain) -> Result<Option<BlockHeader>>;

    /// Next headers strictly after `start`, ascending. An empty batch means
    /// the peer has nothing more to offer.
    async fn get_headers(&self, start: &BlockHeader) -> Result<Vec<BlockHeader>>;

    /// Blocks for `hashes`, in request order.
    async fn get_blocks(&self, hashes: &[Bytes32]) -> Result<Vec<Block>>;

    /// Hook run before each block is committed, e.g. to fetch data the block
    /// depends on.
    async fn sync_block(&self, _chain: &dyn Chain, _block: &Block) -> Result<()> {
        Ok(())
    }

    /// Cheap check whether the task has nothing to do at all.
    fn need_skip(&self, chain: &dyn Chain) -> bool;
}

/// Serves a peer's chain directly through its [`Chain`] accessor.
///
/// Stands in for a network peer in the simulator and integration tests.
pub struct ChainPeerSource<C: Chain> {
    peer: Arc<C>,
    target: BlockHeader,
    header_list_limit: NonZeroU64,
}

impl<C: Chain> ChainPeerSource<C> {
    pub fn new(peer: Arc<C>, target: BlockHeader, header_list_limit: NonZeroU64) -> Self {
        Self {
            peer,
            target,
            header_list_limit,
        }
    }
}

#[async_trait::async_trait]
impl<C: Chain> SyncSource for ChainPeerSource<C> {
    async fn find_ancestor(&self, chain: &dyn Chain) -> Result<Option<BlockHeader>> {
        let mut cursor = Some(self.target.clone());

        while let Some(header) = cursor {
            if chain.contains(&header.hash()) {
                return Ok(Some(header));
            }
            cursor = self.peer.header_by_hash(&header.parent_hash);
        }

        Ok(None)
    }

    async fn get_headers(&self, start: &BlockHeader) -> Result<Vec<BlockHeader>> {
        // Only serve from the peer's canonical chain
        let on_peer = self.peer.header_by_number(start.number);
        if on_peer.as_ref().map(BlockHeader::hash) != Some(start.hash()) {
            trace!(number = start.number, "Start header not canonical on peer");
            return Ok(Vec::new());
        }

        let last = start
            .number
            .saturating_add(self.header_list_limit.get())
            .min(self.target.number);

        Ok((start.number + 1..=last)
            .map_while(|number| self.peer.header_by_number(number))
            .collect())
    }

    async fn get_blocks(&self, hashes: &[Bytes32]) -> Result<Vec<Block>> {
        Ok(hashes
            .iter()
            .map_while(|hash| self.peer.block_by_hash(hash))
            .collect())
    }

    fn need_skip(&self, chain: &dyn Chain) -> bool {
        chain.contains(&self.target.hash()) || self.target.number <= chain.current_header().number
    }
}

#[async_trait::async_trait]
impl<T: SyncSource + ?Sized> SyncSource for Arc<T> {
    async fn find_ancestor(&self, chain: &dyn Chain) -> Result<Option<BlockHeader>> {
        (**self).find_ancestor(chain).await
    }

    async fn get_headers(&self, start: &BlockHeader) -> Result<Vec<BlockHeader>> {
        (**self).get_headers(start).await
    }

    async fn get_blocks(&self, hashes: &[Bytes32]) -> Result<Vec<Block>> {
        (**self).get_blocks(hashes).await
    }

    async fn sync_block(&self, chain: &dyn Chain, block: &Block) -> Result<()> {
        (**self).sync_block(chain, block).await
    }

    fn need_skip(&self, chain: &dyn Chain) -> bool {
        (**self).need_skip(chain)
    }
}
