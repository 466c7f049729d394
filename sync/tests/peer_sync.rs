use std::sync::Arc;

use alloy_primitives::U256;
use chain::{Chain, ChainConfig, MemoryChain};
use chain_sync::{
    ChainPeerSource, ProgressRegistry, SyncConfig, SyncOutcome, SyncTask, Task,
    MAX_STALE_ROOT_BLOCK_HEIGHT_DIFF,
};
use containers::{mine, Block, BlockBody, BlockHeader, SyncingResult, Transaction};
use libp2p_identity::PeerId;
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

fn genesis() -> Block {
    Block {
        header: BlockHeader {
            timestamp: 1_000,
            body_root: BlockBody::default().root(),
            ..Default::default()
        },
        body: BlockBody::default(),
    }
}

/// Append `count` blocks on top of `parent` to every chain in `chains`.
fn grow(chains: &[&MemoryChain], parent: &BlockHeader, count: usize, tag: u8, difficulty: u32) -> Vec<Block> {
    let mut parent = parent.clone();
    let mut blocks = Vec::with_capacity(count);
    for i in 0..count {
        let body = BlockBody {
            transactions: vec![Transaction(vec![tag]), Transaction((i as u64).to_be_bytes().to_vec())],
        };
        let mut block = Block::new_child(&parent, body, parent.timestamp + 10, difficulty);
        block.header = mine(block.header);
        for chain in chains {
            chain.add_block(block.clone()).unwrap();
        }
        parent = block.header.clone();
        blocks.push(block);
    }
    blocks
}

fn task(
    name: &str,
    peer: &Arc<MemoryChain>,
    config: &SyncConfig,
) -> SyncTask<ChainPeerSource<MemoryChain>> {
    let target = peer.current_header();
    let source = ChainPeerSource::new(peer.clone(), target.clone(), config.header_list_limit);
    SyncTask::new(name, target, config, source, PeerId::random(), U256::ZERO)
}

#[tokio::test]
async fn test_root_chain_catches_up_over_several_header_batches() {
    let genesis = genesis();
    let peer = Arc::new(MemoryChain::new(ChainConfig::root(), genesis.clone()));
    let local = MemoryChain::new(ChainConfig::root(), genesis.clone());
    grow(&[&*peer], &genesis.header, 700, 1, 0);

    let outcome = task("root", &peer, &SyncConfig::root()).run(&local).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Synced { head: 700, blocks: 700 });
    assert_eq!(local.current_header(), peer.current_header());
    assert_eq!(local.canonical_headers(), peer.canonical_headers());
}

#[tokio::test]
async fn test_sealed_blocks_pass_full_consensus_on_commit() {
    let genesis = genesis();
    let peer = Arc::new(MemoryChain::new(ChainConfig::shard(1), genesis.clone()));
    let local = MemoryChain::new(ChainConfig::shard(1), genesis.clone());
    grow(&[&*peer], &genesis.header, 30, 1, 6);

    let outcome = task("shard-1", &peer, &SyncConfig::shard()).run(&local).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Synced { head: 30, blocks: 30 });
}

#[tokio::test]
async fn test_shard_progress_reaches_subscribers() {
    let genesis = genesis();
    let peer = Arc::new(MemoryChain::new(ChainConfig::shard(0), genesis.clone()));
    let local = MemoryChain::new(ChainConfig::shard(0), genesis.clone());
    grow(&[&*peer], &genesis.header, 250, 1, 0);

    let (tx, mut rx) = broadcast::channel::<SyncingResult>(64);
    let registry = ProgressRegistry::new(Arc::new(tx));

    let mut first = task("shard-0", &peer, &SyncConfig::shard());
    let second = task("shard-1", &peer, &SyncConfig::shard());
    first.set_progress_sink(registry.claim(first.name()).unwrap());
    assert!(registry.claim(second.name()).is_none());
    assert!(!second.has_progress_sink());

    first.run(&local).await.unwrap();
    registry.release(first.name());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            SyncingResult::new(true, 0, 250),
            SyncingResult::new(true, 100, 100),
            SyncingResult::new(true, 200, 200),
            SyncingResult::new(false, 250, 250),
        ]
    );
    assert!(registry.claim(second.name()).is_some());
}

#[tokio::test]
async fn test_heavier_fork_replaces_local_branch() {
    let genesis = genesis();
    let peer = Arc::new(MemoryChain::new(ChainConfig::shard(2), genesis.clone()));
    let local = MemoryChain::new(ChainConfig::shard(2), genesis.clone());

    let shared = grow(&[&*peer, &local], &genesis.header, 20, 1, 0);
    let ours = grow(&[&local], &shared[19].header, 20, 2, 0);
    grow(&[&*peer], &shared[19].header, 40, 3, 0);
    assert_eq!(local.current_header(), ours[19].header);

    let outcome = task("shard-2", &peer, &SyncConfig::shard()).run(&local).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Synced { head: 60, blocks: 40 });
    assert_eq!(local.current_header(), peer.current_header());
    assert_eq!(local.header_by_number(21), peer.header_by_number(21));
    // losing branch stays stored but off the canonical index
    assert!(local.contains(&ours[0].hash()));
}

#[tokio::test]
async fn test_root_fork_too_old_is_ignored() {
    let genesis = genesis();
    let peer = Arc::new(MemoryChain::new(ChainConfig::root(), genesis.clone()));
    let local = MemoryChain::new(ChainConfig::root(), genesis.clone());

    let shared = grow(&[&*peer, &local], &genesis.header, 30, 1, 0);
    let stale = MAX_STALE_ROOT_BLOCK_HEIGHT_DIFF as usize + 10;
    grow(&[&local], &shared[29].header, stale, 2, 0);
    grow(&[&*peer], &shared[29].header, stale + 20, 3, 0);
    let head = local.current_header();

    let outcome = task("root", &peer, &SyncConfig::root()).run(&local).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::StaleAncestor {
            current: head.number,
            ancestor: 30
        }
    );
    assert_eq!(local.current_header(), head);
}

#[tokio::test]
async fn test_up_to_date_peer_is_skipped() {
    let genesis = genesis();
    let peer = Arc::new(MemoryChain::new(ChainConfig::root(), genesis.clone()));
    let local = MemoryChain::new(ChainConfig::root(), genesis.clone());
    grow(&[&*peer, &local], &genesis.header, 10, 1, 0);

    let outcome = task("root", &peer, &SyncConfig::root()).run(&local).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Skipped);
}
