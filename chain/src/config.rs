use serde::{Deserialize, Serialize};
use std::fmt;

/// Divisor applied to a header's difficulty when the seal is checked without
/// full consensus strictness (header fast path during sync).
pub const SEAL_RELAXATION_DIVISOR: u32 = 20;

/// Which chain of the cluster an accessor serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Root,
    Shard(u32),
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainKind::Root => write!(f, "root"),
            ChainKind::Shard(id) => write!(f, "shard-{id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub kind: ChainKind,
    #[serde(default = "default_relaxation_divisor")]
    pub seal_relaxation_divisor: u32,
}

fn default_relaxation_divisor() -> u32 {
    SEAL_RELAXATION_DIVISOR
}

impl ChainConfig {
    pub fn root() -> Self {
        Self {
            kind: ChainKind::Root,
            seal_relaxation_divisor: SEAL_RELAXATION_DIVISOR,
        }
    }

    pub fn shard(id: u32) -> Self {
        Self {
            kind: ChainKind::Shard(id),
            seal_relaxation_divisor: SEAL_RELAXATION_DIVISOR,
        }
    }

    /// Work required from a seal with the given difficulty.
    pub fn required_seal_bits(&self, difficulty: u32, full_consensus: bool) -> u32 {
        if full_consensus {
            difficulty
        } else {
            difficulty / self.seal_relaxation_divisor.max(1)
        }
    }
}
