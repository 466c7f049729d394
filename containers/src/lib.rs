pub mod types;
pub mod block;
pub mod status;

pub use block::{mine, Block, BlockBody, BlockHeader, Transaction};
pub use status::{Progress, SyncingResult};
pub use types::Bytes32;
