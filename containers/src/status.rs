use serde::{Deserialize, Serialize};

/// Block heights reported while a sync task is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_block: u64,
    pub highest_block: u64,
}

/// Event pushed to progress subscribers.
///
/// `current_block <= highest_block` is expected but not enforced: a regression
/// reflects what the peer served and is reported as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncingResult {
    pub syncing: bool,
    pub status: Progress,
}

impl SyncingResult {
    pub fn new(syncing: bool, current_block: u64, highest_block: u64) -> Self {
        Self {
            syncing,
            status: Progress {
                current_block,
                highest_block,
            },
        }
    }
}
