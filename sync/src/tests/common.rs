use std::collections::{HashMap, VecDeque};
use std::num::{NonZeroU64, NonZeroUsize};
use std::sync::Arc;

use alloy_primitives::U256;
use anyhow::{anyhow, Result};
use chain::{Chain, ChainConfig, MemoryChain};
use containers::{Block, BlockBody, BlockHeader, Bytes32, SyncingResult, Transaction};
use libp2p_identity::PeerId;
use parking_lot::Mutex;

use crate::{ProgressSink, SyncConfig, SyncSource, SyncTask, Task};

pub fn genesis() -> Block {
    Block {
        header: BlockHeader {
            timestamp: 1_000,
            body_root: BlockBody::default().root(),
            ..Default::default()
        },
        body: BlockBody::default(),
    }
}

/// `count` blocks on top of `parent`. `tag` keeps forks apart.
pub fn build_blocks(parent: &BlockHeader, count: usize, tag: u8) -> Vec<Block> {
    let mut parent = parent.clone();
    (0..count)
        .map(|_| {
            let body = BlockBody {
                transactions: vec![Transaction(vec![tag, parent.number as u8])],
            };
            let block = Block::new_child(&parent, body, parent.timestamp + 10, 0);
            parent = block.header.clone();
            block
        })
        .collect()
}

pub fn headers(blocks: &[Block]) -> Vec<BlockHeader> {
    blocks.iter().map(|block| block.header.clone()).collect()
}

/// Chain holding `genesis` followed by `blocks`.
pub fn chain_with(genesis: &Block, blocks: &[Block]) -> MemoryChain {
    let chain = MemoryChain::new(ChainConfig::shard(0), genesis.clone());
    for block in blocks {
        chain.add_block(block.clone()).expect("test block must be valid");
    }
    chain
}

pub fn config(batch_size: usize, max_sync_staleness: u64) -> SyncConfig {
    SyncConfig {
        header_list_limit: NonZeroU64::new(100).unwrap(),
        block_batch_size: NonZeroUsize::new(batch_size).unwrap(),
        max_sync_staleness,
    }
}

/// Task in the shard reporting group with `sink` attached.
pub fn shard_task(
    target: BlockHeader,
    source: Arc<MockSource>,
    config: &SyncConfig,
    sink: &Arc<RecordingSink>,
) -> SyncTask<Arc<MockSource>> {
    let mut task = SyncTask::new("shard-0", target, config, source, PeerId::random(), U256::from(1));
    task.set_progress_sink(sink.clone());
    task
}

pub fn event(syncing: bool, current: u64, highest: u64) -> SyncingResult {
    SyncingResult::new(syncing, current, highest)
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncingResult>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SyncingResult> {
        self.events.lock().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, event: SyncingResult) -> usize {
        self.events.lock().push(event);
        1
    }
}

/// Scripted peer. Header batches are served in order, then empty batches.
#[derive(Default)]
pub struct MockSource {
    ancestor: Option<BlockHeader>,
    fail_ancestor: bool,
    skip: bool,
    batches: Mutex<VecDeque<Result<Vec<BlockHeader>>>>,
    blocks: HashMap<Bytes32, Block>,
    drop_last_block: bool,
    pad_extra_block: Option<Block>,
    swap_blocks: bool,
    tamper_body_at: Option<u64>,
    fail_hook_at: Option<u64>,

    pub ancestor_calls: Mutex<usize>,
    pub header_calls: Mutex<Vec<u64>>,
    pub block_requests: Mutex<Vec<usize>>,
    pub hooked: Mutex<Vec<u64>>,
}

impl MockSource {
    pub fn new(ancestor: Option<BlockHeader>) -> Self {
        Self {
            ancestor,
            ..Default::default()
        }
    }

    pub fn with_blocks(mut self, blocks: &[Block]) -> Self {
        self.blocks
            .extend(blocks.iter().map(|block| (block.hash(), block.clone())));
        self
    }

    pub fn with_batch(self, headers: Vec<BlockHeader>) -> Self {
        self.batches.lock().push_back(Ok(headers));
        self
    }

    pub fn with_batch_error(self, message: &'static str) -> Self {
        self.batches.lock().push_back(Err(anyhow!(message)));
        self
    }

    pub fn skipping(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn failing_ancestor(mut self) -> Self {
        self.fail_ancestor = true;
        self
    }

    pub fn dropping_last_block(mut self) -> Self {
        self.drop_last_block = true;
        self
    }

    /// Append `extra` to every block response.
    pub fn padding_extra_block(mut self, extra: Block) -> Self {
        self.pad_extra_block = Some(extra);
        self
    }

    pub fn swapping_blocks(mut self) -> Self {
        self.swap_blocks = true;
        self
    }

    pub fn tampering_body_at(mut self, number: u64) -> Self {
        self.tamper_body_at = Some(number);
        self
    }

    pub fn failing_hook_at(mut self, number: u64) -> Self {
        self.fail_hook_at = Some(number);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl SyncSource for MockSource {
    async fn find_ancestor(&self, _chain: &dyn Chain) -> Result<Option<BlockHeader>> {
        *self.ancestor_calls.lock() += 1;
        if self.fail_ancestor {
            return Err(anyhow!("ancestor lookup timed out"));
        }
        Ok(self.ancestor.clone())
    }

    async fn get_headers(&self, start: &BlockHeader) -> Result<Vec<BlockHeader>> {
        self.header_calls.lock().push(start.number);
        self.batches.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_blocks(&self, hashes: &[Bytes32]) -> Result<Vec<Block>> {
        self.block_requests.lock().push(hashes.len());

        let mut blocks: Vec<Block> = hashes
            .iter()
            .filter_map(|hash| self.blocks.get(hash).cloned())
            .collect();

        if self.drop_last_block {
            blocks.pop();
        }
        if let Some(extra) = &self.pad_extra_block {
            blocks.push(extra.clone());
        }
        if self.swap_blocks && blocks.len() >= 2 {
            blocks.swap(0, 1);
        }
        if let Some(number) = self.tamper_body_at {
            for block in blocks.iter_mut().filter(|block| block.number() == number) {
                block.body.transactions.push(Transaction(vec![0xff]));
            }
        }
        Ok(blocks)
    }

    async fn sync_block(&self, _chain: &dyn Chain, block: &Block) -> Result<()> {
        if self.fail_hook_at == Some(block.number()) {
            return Err(anyhow!("missing cross-shard data"));
        }
        self.hooked.lock().push(block.number());
        Ok(())
    }

    fn need_skip(&self, _chain: &dyn Chain) -> bool {
        self.skip
    }
}
