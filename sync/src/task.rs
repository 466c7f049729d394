use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::U256;
use chain::Chain;
use containers::{BlockHeader, Bytes32, SyncingResult};
use libp2p_identity::PeerId;
use metrics::Metrics;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::{
    config::{SyncConfig, PROGRESS_REPORT_INTERVAL},
    error::SyncError,
    progress::{reporting_group, ProgressSink, ProgressThrottle},
    source::SyncSource,
    validation::validate_header_list,
};

/// How a task finished without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The skip check found nothing to do; no events were emitted.
    Skipped,
    /// The peer shares no history with the local chain.
    NoCommonAncestor,
    /// The fork point is further behind the local head than allowed.
    StaleAncestor { current: u64, ancestor: u64 },
    /// Headers were followed until the target or the end of what the peer
    /// served. `head` is the last header reached.
    Synced { head: u64, blocks: u64 },
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Skipped => "skipped",
            SyncOutcome::NoCommonAncestor => "no_ancestor",
            SyncOutcome::StaleAncestor { .. } => "stale",
            SyncOutcome::Synced { .. } => "synced",
        }
    }
}

/// A unit of synchronization work against one peer.
///
/// Created by a scheduler, run once, then dropped. Retries are new tasks.
#[async_trait::async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, chain: &dyn Chain) -> Result<SyncOutcome, SyncError>;

    /// Rank among competing tasks, assigned by the scheduler.
    fn priority(&self) -> U256;

    fn peer_id(&self) -> PeerId;

    fn name(&self) -> &str;

    /// Attach a progress sink. Only the first sink is kept, and only tasks of
    /// a reporting group accept one.
    fn set_progress_sink(&mut self, sink: Arc<dyn ProgressSink>);
}

/// Catch-up task: find the fork point, then pull headers and blocks in
/// batches until the peer's target header is reached.
pub struct SyncTask<S: SyncSource> {
    name: String,
    header: BlockHeader,
    max_sync_staleness: u64,
    batch_size: NonZeroUsize,
    source: S,
    priority: U256,
    peer_id: PeerId,
    sink: Option<Arc<dyn ProgressSink>>,
    metrics: Option<Metrics>,
}

impl<S: SyncSource> SyncTask<S> {
    pub fn new(
        name: impl Into<String>,
        header: BlockHeader,
        config: &SyncConfig,
        source: S,
        peer_id: PeerId,
        priority: U256,
    ) -> Self {
        Self {
            name: name.into(),
            header,
            max_sync_staleness: config.max_sync_staleness,
            batch_size: config.block_batch_size,
            source,
            priority,
            peer_id,
            sink: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn has_progress_sink(&self) -> bool {
        self.sink.is_some()
    }

    fn send_sync(&self, syncing: bool, current: u64, highest: u64) {
        if let Some(sink) = &self.sink {
            let reached = sink.report(SyncingResult::new(syncing, current, highest));
            trace!(syncing, current, highest, reached, "Reported sync progress");
        }
    }

    async fn sync(&self, chain: &dyn Chain) -> Result<SyncOutcome, SyncError> {
        let ancestor = self
            .source
            .find_ancestor(chain)
            .await
            .map_err(SyncError::AncestorLookup)?;

        let Some(mut ancestor) = ancestor else {
            debug!("No common ancestor with peer");
            return Ok(SyncOutcome::NoCommonAncestor);
        };

        let current = chain.current_header().number;
        if current.saturating_sub(ancestor.number) > self.max_sync_staleness {
            warn!(
                current_height = current,
                old_height = ancestor.number,
                max_staleness = self.max_sync_staleness,
                "Abort syncing due to forking at super old block"
            );
            return Ok(SyncOutcome::StaleAncestor {
                current,
                ancestor: ancestor.number,
            });
        }

        let target = self.header.number;
        let target_hash = self.header.hash();
        let mut committed = 0u64;

        while ancestor.hash() != target_hash {
            let headers = self
                .source
                .get_headers(&ancestor)
                .await
                .map_err(|source| SyncError::HeaderFetch {
                    from: ancestor.number,
                    source,
                })?;

            let Some(last) = headers.last().map(|header| header.number) else {
                debug!(ancestor = ancestor.number, "Peer has no more headers");
                break;
            };

            validate_header_list(chain, &ancestor, &headers)?;
            if let Some(metrics) = &self.metrics {
                metrics.inc_headers_validated(&self.name, headers.len() as u64);
            }

            info!(
                length = headers.len(),
                from = ancestor.number,
                to = last,
                target_height = target,
                "Downloading blocks"
            );

            let hashes: Vec<Bytes32> = headers.iter().map(BlockHeader::hash).collect();
            let mut throttle = ProgressThrottle::new(PROGRESS_REPORT_INTERVAL);

            for chunk in hashes.chunks(self.batch_size.get()) {
                let started = Instant::now();
                let blocks = self
                    .source
                    .get_blocks(chunk)
                    .await
                    .map_err(|source| SyncError::BlockFetch {
                        first: chunk[0],
                        count: chunk.len(),
                        source,
                    })?;

                if blocks.len() != chunk.len() {
                    return Err(SyncError::BlockCountMismatch {
                        expected: chunk.len(),
                        actual: blocks.len(),
                        first_hash: chunk[0],
                    });
                }
                if let Some((expected, block)) = chunk
                    .iter()
                    .zip(&blocks)
                    .find(|(expected, block)| block.hash() != **expected)
                {
                    return Err(SyncError::UnexpectedBlock {
                        expected: *expected,
                        actual: block.hash(),
                    });
                }

                for block in blocks {
                    let number = block.number();
                    self.source
                        .sync_block(chain, &block)
                        .await
                        .map_err(|source| SyncError::SyncHook { number, source })?;

                    let header = block.header.clone();
                    chain
                        .add_block(block)
                        .map_err(|source| SyncError::Commit { number, source })?;
                    committed += 1;
                    trace!(number, "Committed block");

                    if let Some(metrics) = &self.metrics {
                        metrics.inc_blocks_committed(&self.name);
                    }
                    if throttle.tick() {
                        self.send_sync(true, number, last);
                    }

                    ancestor = header;
                }

                if let Some(metrics) = &self.metrics {
                    metrics.observe_block_batch_time(&self.name, started.elapsed().as_secs_f64());
                }
            }
        }

        Ok(SyncOutcome::Synced {
            head: ancestor.number,
            blocks: committed,
        })
    }

    fn record(&self, chain: &dyn Chain, result: &Result<SyncOutcome, SyncError>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(outcome) => metrics.inc_task(&self.name, outcome.label()),
            Err(err) => metrics.inc_task_error(&self.name, err.kind()),
        }
        metrics.set_head_height(&self.name, chain.current_header().number);
    }
}

#[async_trait::async_trait]
impl<S: SyncSource> Task for SyncTask<S> {
    async fn run(&self, chain: &dyn Chain) -> Result<SyncOutcome, SyncError> {
        if self.source.need_skip(chain) {
            trace!(task = %self.name, target_height = self.header.number, "Skipping sync task");
            return Ok(SyncOutcome::Skipped);
        }

        let target = self.header.number;
        self.send_sync(true, chain.current_header().number, target);

        let span = info_span!(
            "synctask",
            task = %self.name,
            peer = %self.peer_id,
            target_height = target
        );
        let result = self.sync(chain).instrument(span).await;

        if let Err(err) = &result {
            warn!(task = %self.name, peer = %self.peer_id, error = %err, "Sync task failed");
        }

        self.send_sync(false, chain.current_header().number, target);
        self.record(chain, &result);

        result
    }

    fn priority(&self) -> U256 {
        self.priority
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_progress_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        if self.sink.is_none() && reporting_group(&self.name).is_some() {
            self.sink = Some(sink);
        }
    }
}
