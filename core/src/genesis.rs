//! The pre-genesis block header.

use rollup_crypto::{EMPTY_STRING_KECCAK, ZERO_DIGEST};
use rollup_types::StoredBlockInfo;
use state_merkle::ChainTrees;

/// Header of the implicit block zero: no transactions, no priority
/// operations, the empty-input Keccak accumulator, and the state root of
/// four entirely empty trees. The settlement contract is initialized with
/// this header so the first committed block chains onto a known value.
pub fn default_block_header() -> StoredBlockInfo {
    StoredBlockInfo {
        block_size: 0,
        block_number: 0,
        priority_operations: 0,
        pending_onchain_operations_hash: EMPTY_STRING_KECCAK,
        timestamp_ms: 0,
        state_root: ChainTrees::nil_state_root(),
        commitment: ZERO_DIGEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_commits_to_empty_trees() {
        let header = default_block_header();
        assert_eq!(header.block_number, 0);
        assert_eq!(header.state_root, ChainTrees::nil_state_root());
        assert_eq!(
            header.pending_onchain_operations_hash,
            EMPTY_STRING_KECCAK
        );
        assert_eq!(header.commitment, ZERO_DIGEST);
    }
}
