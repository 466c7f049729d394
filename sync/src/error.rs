use chain::ChainError;
use containers::Bytes32;
use thiserror::Error;

/// Reasons a sync task fails.
///
/// Successful terminations with nothing to do (no common ancestor, stale
/// fork, peer out of headers) are not errors; see `SyncOutcome`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to find common ancestor with peer")]
    AncestorLookup(#[source] anyhow::Error),

    #[error("failed to fetch headers after block {from}")]
    HeaderFetch {
        from: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to fetch {count} blocks starting at {first}")]
    BlockFetch {
        first: Bytes32,
        count: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("non-contiguous header sequence: {current} follows {previous}")]
    NonContiguousHeaders { previous: u64, current: u64 },

    #[error("broken header chain at block {number}: parent {parent}, expected {expected}")]
    BrokenHeaderChain {
        number: u64,
        expected: Bytes32,
        parent: Bytes32,
    },

    #[error("unmatched block count: expected {expected}, received {actual} (first hash {first_hash})")]
    BlockCountMismatch {
        expected: usize,
        actual: usize,
        first_hash: Bytes32,
    },

    #[error("peer returned block {actual} where {expected} was requested")]
    UnexpectedBlock { expected: Bytes32, actual: Bytes32 },

    #[error("invalid seal on header {number}")]
    InvalidSeal {
        number: u64,
        #[source]
        source: ChainError,
    },

    #[error("sync hook rejected block {number}")]
    SyncHook {
        number: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to commit block {number}")]
    Commit {
        number: u64,
        #[source]
        source: ChainError,
    },
}

impl SyncError {
    /// Whether the peer broke the sync protocol. Callers feed this into peer
    /// scoring.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            SyncError::NonContiguousHeaders { .. }
                | SyncError::BrokenHeaderChain { .. }
                | SyncError::BlockCountMismatch { .. }
                | SyncError::UnexpectedBlock { .. }
        )
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::AncestorLookup(_) | SyncError::HeaderFetch { .. } | SyncError::BlockFetch { .. } => {
                "fetch"
            }
            SyncError::NonContiguousHeaders { .. }
            | SyncError::BrokenHeaderChain { .. }
            | SyncError::BlockCountMismatch { .. }
            | SyncError::UnexpectedBlock { .. } => "protocol",
            SyncError::InvalidSeal { .. } => "validation",
            SyncError::SyncHook { .. } | SyncError::Commit { .. } => "commit",
        }
    }
}
