use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::U256;
use anyhow::{Context, Result};
use chain::{Chain, ChainConfig, ChainKind, MemoryChain};
use chain_sync::{ChainPeerSource, ProgressRegistry, SyncConfig, SyncTask, Task};
use clap::Parser;
use containers::{mine, Block, BlockBody, BlockHeader, SyncingResult, Transaction};
use libp2p_identity::PeerId;
use metrics::Metrics;
use tokio::{sync::mpsc, task};
use tracing::{info, warn};

/// Run one sync task between two in-memory chains.
#[derive(Parser, Debug)]
struct Args {
    /// Sync a shard chain instead of the root chain
    #[arg(short, long)]
    shard: Option<u32>,

    /// Height of the peer's chain
    #[arg(long, default_value_t = 300)]
    peer_height: u64,

    /// Height of the local chain
    #[arg(long, default_value_t = 0)]
    local_height: u64,

    /// Last height both chains share. Defaults to the local height
    #[arg(long)]
    fork_at: Option<u64>,

    /// Seal difficulty of generated blocks
    #[arg(short, long, default_value_t = 0)]
    difficulty: u32,

    /// YAML file with sync batch sizes and staleness bound
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the staleness bound
    #[arg(long)]
    max_staleness: Option<u64>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

fn genesis() -> Block {
    let body = BlockBody::default();
    Block {
        header: BlockHeader {
            body_root: body.root(),
            ..Default::default()
        },
        body,
    }
}

/// Extend `chain` from `parent` up to `height`, tagging bodies with `tag` so
/// distinct branches never collide.
fn grow(chain: &MemoryChain, parent: BlockHeader, height: u64, tag: u8, difficulty: u32) -> Result<BlockHeader> {
    let mut parent = parent;
    while parent.number < height {
        let body = BlockBody {
            transactions: vec![Transaction([&[tag][..], &parent.number.to_be_bytes()].concat())],
        };
        let mut block = Block::new_child(&parent, body, parent.timestamp + 1, difficulty);
        block.header = mine(block.header);
        parent = block.header.clone();
        chain
            .add_block(block)
            .with_context(|| format!("failed to build block {}", parent.number))?;
    }
    Ok(parent)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let kind = args.shard.map_or(ChainKind::Root, ChainKind::Shard);
    let chain_config = match kind {
        ChainKind::Root => ChainConfig::root(),
        ChainKind::Shard(id) => ChainConfig::shard(id),
    };

    let mut sync_config = match &args.config {
        Some(path) => SyncConfig::load_from_file(path)?,
        None => SyncConfig::for_chain(kind),
    };
    if let Some(max_staleness) = args.max_staleness {
        sync_config.max_sync_staleness = max_staleness;
    }

    let genesis = genesis();
    let fork_at = args.fork_at.unwrap_or(args.local_height).min(args.local_height);

    let peer = Arc::new(MemoryChain::new(chain_config.clone(), genesis.clone()));
    let local = MemoryChain::new(chain_config, genesis.clone());

    let shared = grow(&peer, genesis.header.clone(), fork_at.min(args.peer_height), 0, args.difficulty)?;
    grow(&local, genesis.header, shared.number, 0, args.difficulty)?;
    grow(&local, shared.clone(), args.local_height, 1, args.difficulty)?;
    let target = grow(&peer, shared, args.peer_height, 2, args.difficulty)?;

    info!(
        chain = %kind,
        local_height = local.current_header().number,
        peer_height = target.number,
        fork_at,
        "Prepared chains"
    );

    let metrics = Metrics::new()?;
    let (progress_sender, mut progress_receiver) = mpsc::unbounded_channel::<SyncingResult>();
    let registry = ProgressRegistry::new(Arc::new(progress_sender));

    let progress_handle = task::spawn(async move {
        while let Some(event) = progress_receiver.recv().await {
            info!(
                syncing = event.syncing,
                current = event.status.current_block,
                highest = event.status.highest_block,
                "Sync progress"
            );
        }
    });

    let name = kind.to_string();
    let source = ChainPeerSource::new(peer.clone(), target.clone(), sync_config.header_list_limit);
    let mut sync_task = SyncTask::new(&name, target, &sync_config, source, PeerId::random(), U256::ZERO)
        .with_metrics(metrics.clone());
    let claimed = registry.claim(&name);
    let reporting = claimed.is_some();
    if let Some(sink) = claimed {
        sync_task.set_progress_sink(sink);
    }

    let result = sync_task.run(&local).await;
    if reporting {
        registry.release(&name);
    }
    drop(sync_task);
    drop(registry);
    progress_handle.await?;

    match &result {
        Ok(outcome) => info!(
            ?outcome,
            head = local.current_header().number,
            "Sync task finished"
        ),
        Err(err) => warn!(error = %err, protocol_violation = err.is_protocol_violation(), "Sync task failed"),
    }

    if args.metrics {
        print!("{}", metrics.gather()?);
    }

    result?;
    Ok(())
}
