//! Finalized blocks, history snapshots, and the atomic persistence batch.

use serde::{Deserialize, Serialize};

use rollup_crypto::Digest;

use crate::account::{AccountHistory, AccountState};
use crate::asset::{LiquidityPool, Nft};
use crate::tx::PendingTransaction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockStatus {
    /// Committed locally, not yet submitted to the settlement layer.
    Pending,
    /// Accepted by the settlement contract.
    Committed,
    /// Proven and verified on the settlement layer.
    Verified,
}

/// One finalized rollup block. Immutable once persisted except for status
/// promotion by the finality process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub height: i64,
    pub commitment: Digest,
    pub state_root: Digest,
    pub priority_operations: u32,
    pub pending_onchain_operations_hash: Digest,
    pub public_data: Vec<u8>,
    /// Byte offsets of priority-operation records within `public_data`.
    pub public_data_offsets: Vec<u32>,
    pub created_at_ms: i64,
    pub txs: Vec<PendingTransaction>,
    pub status: BlockStatus,
}

/// Fixed-width block header handed to the settlement-submission component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlockInfo {
    pub block_size: u16,
    pub block_number: u32,
    pub priority_operations: u32,
    pub pending_onchain_operations_hash: Digest,
    pub timestamp_ms: i64,
    pub state_root: Digest,
    pub commitment: Digest,
}

impl Block {
    pub fn stored_block_info(&self) -> StoredBlockInfo {
        StoredBlockInfo {
            block_size: self.txs.len() as u16,
            block_number: self.height as u32,
            priority_operations: self.priority_operations,
            pending_onchain_operations_hash: self.pending_onchain_operations_hash,
            timestamp_ms: self.created_at_ms,
            state_root: self.state_root,
            commitment: self.commitment,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidityHistory {
    pub pool: LiquidityPool,
    pub block_height: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NftHistory {
    pub nft: Nft,
    pub block_height: i64,
}

/// Everything one committer slot persists, as a single atomic unit: the
/// block, the status-stamped transactions, and every record the block
/// touched together with its history snapshot. Record vectors are sorted by
/// their primary index so persistence order is reproducible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommittedBatch {
    pub block: Block,
    pub updated_txs: Vec<PendingTransaction>,
    pub account_upserts: Vec<AccountState>,
    pub account_history: Vec<AccountHistory>,
    pub liquidity_upserts: Vec<LiquidityPool>,
    pub liquidity_history: Vec<LiquidityHistory>,
    pub nft_inserts: Vec<Nft>,
    pub nft_upserts: Vec<Nft>,
    pub nft_history: Vec<NftHistory>,
}
