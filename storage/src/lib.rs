//! Repository interfaces the state-transition core depends on, plus two
//! implementations: an in-memory store for tests and embedding, and a
//! sled-backed store whose committed-block write is a single atomic insert.
//!
//! The core only ever sees these traits; the request/API layer, the L1
//! sender, and the monitor own their own access paths.

use thiserror::Error;

use rollup_types::{AccountState, Block, CommittedBatch, LiquidityPool, Nft, PendingTransaction};

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested record does not exist. Callers distinguish this from
    /// backend failure: an empty mempool or a chain with no blocks yet is
    /// not an error.
    #[error("record not found")]
    NotFound,
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),
    #[error("storage codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Pending-transaction backlog, ordered by submission sequence.
pub trait MempoolReader {
    /// Returns `StorageError::NotFound` when the backlog is empty.
    fn list_pending_transactions(&self) -> Result<Vec<PendingTransaction>, StorageError>;
}

pub trait AccountRepository {
    fn account_by_index(&self, account_index: u32) -> Result<AccountState, StorageError>;
}

pub trait LiquidityRepository {
    fn liquidity_by_pair_index(&self, pair_index: u16) -> Result<LiquidityPool, StorageError>;
}

pub trait NftRepository {
    fn nft_by_index(&self, nft_index: u64) -> Result<Nft, StorageError>;
}

pub trait BlockRepository {
    /// Height of the latest committed block; `NotFound` means no blocks yet.
    fn current_height(&self) -> Result<i64, StorageError>;

    fn block_by_height(&self, height: i64) -> Result<Block, StorageError>;

    /// Persist one committer slot as a single atomic unit. Either the whole
    /// batch becomes visible or none of it does; a block row without its
    /// transaction rows must never be observable.
    fn persist_committed_block(&self, batch: CommittedBatch) -> Result<(), StorageError>;
}
