//! Block catch-up synchronization.
//!
//! A [`SyncTask`] brings the local chain up to a peer's claimed head:
//!
//! 1. Skip early when the peer has nothing we lack
//! 2. Find the latest header both chains share
//! 3. Refuse forks that start too far behind the local head
//! 4. Pull header batches after the ancestor and validate linkage and seals
//! 5. Pull the matching blocks in fixed-size batches and commit them in order
//! 6. Report progress to at most one observer per reporting group
//!
//! The same task serves the root chain and every shard chain. What differs is
//! the [`SyncSource`] it is built with and the numbers in [`SyncConfig`].
//!
//! ## Safety
//!
//! - Header batches are rejected as a whole on any gap, broken link or bad seal
//! - Block batches must match the requested hashes one for one
//! - The staleness bound keeps a peer from forcing re-verification of
//!   arbitrarily deep history
pub mod config;
pub mod error;
pub mod progress;
pub mod source;
pub mod task;
pub mod validation;

pub use config::*;
pub use error::SyncError;
pub use progress::{ProgressRegistry, ProgressSink, ProgressThrottle};
pub use source::{ChainPeerSource, SyncSource};
pub use task::{SyncOutcome, SyncTask, Task};
pub use validation::validate_header_list;

#[cfg(test)]
mod tests;
