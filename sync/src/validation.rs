use chain::Chain;
use containers::BlockHeader;

use crate::error::SyncError;

/// Validate a header batch served by a peer.
///
/// The batch must extend `ancestor` one number at a time with every header
/// linked to its predecessor. The ancestor takes part in the linkage checks
/// only; it was accepted by an earlier cycle, so only batch headers get their
/// seal checked. Seals are checked relaxed here, the chain re-applies full
/// strictness on commit.
pub fn validate_header_list(
    chain: &dyn Chain,
    ancestor: &BlockHeader,
    headers: &[BlockHeader],
) -> Result<(), SyncError> {
    let mut prev = ancestor;

    for header in headers {
        if prev.number.checked_add(1) != Some(header.number) {
            return Err(SyncError::NonContiguousHeaders {
                previous: prev.number,
                current: header.number,
            });
        }

        let expected = prev.hash();
        if header.parent_hash != expected {
            return Err(SyncError::BrokenHeaderChain {
                number: header.number,
                expected,
                parent: header.parent_hash,
            });
        }

        chain
            .validate_seal(header, false)
            .map_err(|source| SyncError::InvalidSeal {
                number: header.number,
                source,
            })?;

        prev = header;
    }

    Ok(())
}
