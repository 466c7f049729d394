//! Progress reporting for sync tasks.
//!
//! Tasks push [`SyncingResult`] events into a [`ProgressSink`]. Only tasks of
//! a reporting group publish progress, and only one task per group holds the
//! sink at a time, so observers never see interleaved streams for the same
//! logical chain set.

use std::collections::HashMap;
use std::sync::Arc;

use containers::SyncingResult;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Task name prefix of the shard reporting group.
pub const SHARD_REPORTING_PREFIX: &str = "shard-";

/// Reporting group a task belongs to, by task name.
pub fn reporting_group(task_name: &str) -> Option<&'static str> {
    task_name.starts_with(SHARD_REPORTING_PREFIX).then_some("shard")
}

/// Destination for progress events.
pub trait ProgressSink: Send + Sync {
    /// Deliver an event. Returns the number of subscribers reached.
    fn report(&self, event: SyncingResult) -> usize;
}

impl ProgressSink for broadcast::Sender<SyncingResult> {
    fn report(&self, event: SyncingResult) -> usize {
        // no subscribers is not an error for progress
        self.send(event).unwrap_or(0)
    }
}

impl ProgressSink for mpsc::UnboundedSender<SyncingResult> {
    fn report(&self, event: SyncingResult) -> usize {
        usize::from(self.send(event).is_ok())
    }
}

/// Hands the progress sink to the first task of each reporting group.
///
/// Owned by whoever schedules tasks: it claims a slot while wiring a task and
/// releases it once the task has finished. Only the holder can release.
pub struct ProgressRegistry {
    sink: Arc<dyn ProgressSink>,
    /// group -> name of the task holding the slot
    claimed: Mutex<HashMap<&'static str, String>>,
}

impl ProgressRegistry {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            claimed: Mutex::new(HashMap::new()),
        }
    }

    /// Sink for `task_name`, if it belongs to a reporting group whose slot is
    /// still free.
    pub fn claim(&self, task_name: &str) -> Option<Arc<dyn ProgressSink>> {
        let group = reporting_group(task_name)?;
        let mut claimed = self.claimed.lock();
        if let Some(holder) = claimed.get(group) {
            debug!(task = task_name, group, holder = %holder, "Reporting group already claimed");
            return None;
        }
        claimed.insert(group, task_name.to_owned());
        Some(self.sink.clone())
    }

    /// Free the group slot if `task_name` holds it. Other callers are ignored.
    pub fn release(&self, task_name: &str) {
        let Some(group) = reporting_group(task_name) else {
            return;
        };
        let mut claimed = self.claimed.lock();
        if claimed.get(group).is_some_and(|holder| holder == task_name) {
            claimed.remove(group);
        }
    }

    pub fn is_claimed(&self, task_name: &str) -> bool {
        reporting_group(task_name).is_some_and(|group| self.claimed.lock().contains_key(group))
    }
}

/// Lets one event through every `interval` ticks.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: usize,
    count: usize,
}

impl ProgressThrottle {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            count: 0,
        }
    }

    /// Count one unit of work; true when an event is due.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        self.count % self.interval == 0
    }
}
