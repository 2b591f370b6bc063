//! Sled-backed store for committed blocks and the records they touch.
//!
//! The commit point for a block is one `batches` insert: the whole
//! [`CommittedBatch`] is serialized under its height key, so a reader either
//! sees the complete batch or nothing. The per-record trees (`accounts`,
//! `liquidity`, `nfts`, `blocks`, `meta`) are derived indexes; `open`
//! replays any batches written after the recorded height so a crash between
//! the commit point and the index writes cannot surface a torn state.

use std::path::Path;

use tracing::info;

use rollup_types::{AccountState, Block, CommittedBatch, LiquidityPool, Nft};

use crate::{
    AccountRepository, BlockRepository, LiquidityRepository, NftRepository, StorageError,
};

const META_HEIGHT_KEY: &[u8] = b"height";

#[derive(Debug)]
pub struct SledStore {
    db: sled::Db,
    batches: sled::Tree,
    blocks: sled::Tree,
    accounts: sled::Tree,
    liquidity: sled::Tree,
    nfts: sled::Tree,
    meta: sled::Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let store = Self {
            batches: db.open_tree("batches")?,
            blocks: db.open_tree("blocks")?,
            accounts: db.open_tree("accounts")?,
            liquidity: db.open_tree("liquidity")?,
            nfts: db.open_tree("nfts")?,
            meta: db.open_tree("meta")?,
            db,
        };
        store.replay_unindexed()?;
        Ok(store)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn indexed_height(&self) -> Result<Option<i64>, StorageError> {
        Ok(self
            .meta
            .get(META_HEIGHT_KEY)?
            .map(|bytes| bincode::deserialize::<i64>(&bytes))
            .transpose()?)
    }

    fn replay_unindexed(&self) -> Result<(), StorageError> {
        let indexed = self.indexed_height()?.unwrap_or(0);
        for entry in self.batches.range(height_key(indexed + 1)..) {
            let (_, bytes) = entry?;
            let batch: CommittedBatch = bincode::deserialize(&bytes)?;
            info!(height = batch.block.height, "reindexing committed batch");
            self.apply_indexes(&batch)?;
        }
        Ok(())
    }

    fn apply_indexes(&self, batch: &CommittedBatch) -> Result<(), StorageError> {
        for account in &batch.account_upserts {
            self.accounts
                .insert(u32_key(account.account_index), bincode::serialize(account)?)?;
        }
        for pool in &batch.liquidity_upserts {
            self.liquidity
                .insert(pool.pair_index.to_be_bytes().as_slice(), bincode::serialize(pool)?)?;
        }
        for nft in batch.nft_inserts.iter().chain(batch.nft_upserts.iter()) {
            self.nfts
                .insert(nft.nft_index.to_be_bytes().as_slice(), bincode::serialize(nft)?)?;
        }
        self.blocks
            .insert(height_key(batch.block.height), bincode::serialize(&batch.block)?)?;
        self.meta
            .insert(META_HEIGHT_KEY, bincode::serialize(&batch.block.height)?)?;
        Ok(())
    }
}

impl BlockRepository for SledStore {
    fn current_height(&self) -> Result<i64, StorageError> {
        self.indexed_height()?.ok_or(StorageError::NotFound)
    }

    fn block_by_height(&self, height: i64) -> Result<Block, StorageError> {
        let bytes = self
            .blocks
            .get(height_key(height))?
            .ok_or(StorageError::NotFound)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn persist_committed_block(&self, batch: CommittedBatch) -> Result<(), StorageError> {
        let height = batch.block.height;
        // Commit point: one insert, then derived indexes.
        self.batches
            .insert(height_key(height), bincode::serialize(&batch)?)?;
        self.apply_indexes(&batch)?;
        self.db.flush()?;
        info!(
            height,
            txs = batch.block.txs.len(),
            priority_operations = batch.block.priority_operations,
            "persisted committed block"
        );
        Ok(())
    }
}

impl AccountRepository for SledStore {
    fn account_by_index(&self, account_index: u32) -> Result<AccountState, StorageError> {
        let bytes = self
            .accounts
            .get(u32_key(account_index))?
            .ok_or(StorageError::NotFound)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

impl LiquidityRepository for SledStore {
    fn liquidity_by_pair_index(&self, pair_index: u16) -> Result<LiquidityPool, StorageError> {
        let bytes = self
            .liquidity
            .get(pair_index.to_be_bytes())?
            .ok_or(StorageError::NotFound)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

impl NftRepository for SledStore {
    fn nft_by_index(&self, nft_index: u64) -> Result<Nft, StorageError> {
        let bytes = self
            .nfts
            .get(nft_index.to_be_bytes())?
            .ok_or(StorageError::NotFound)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

fn height_key(height: i64) -> [u8; 8] {
    // Heights are non-negative; big-endian keys keep sled iteration ordered.
    (height as u64).to_be_bytes()
}

fn u32_key(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}
