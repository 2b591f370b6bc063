//! In-memory store used by tests and single-process embeddings.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use rollup_types::{
    AccountState, Block, CommittedBatch, LiquidityPool, Nft, PendingTransaction, TxStatus,
};

use crate::{
    AccountRepository, BlockRepository, LiquidityRepository, MempoolReader, NftRepository,
    StorageError,
};

#[derive(Debug, Default)]
struct Inner {
    mempool: Vec<PendingTransaction>,
    accounts: BTreeMap<u32, AccountState>,
    liquidity: BTreeMap<u16, LiquidityPool>,
    nfts: BTreeMap<u64, Nft>,
    blocks: BTreeMap<i64, Block>,
    batches: BTreeMap<i64, CommittedBatch>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pending_transaction(&self, tx: PendingTransaction) {
        self.inner.lock().mempool.push(tx);
    }

    pub fn put_account(&self, account: AccountState) {
        let mut guard = self.inner.lock();
        guard.accounts.insert(account.account_index, account);
    }

    pub fn put_liquidity(&self, pool: LiquidityPool) {
        let mut guard = self.inner.lock();
        guard.liquidity.insert(pool.pair_index, pool);
    }

    pub fn put_nft(&self, nft: Nft) {
        let mut guard = self.inner.lock();
        guard.nfts.insert(nft.nft_index, nft);
    }

    pub fn batch_at(&self, height: i64) -> Option<CommittedBatch> {
        self.inner.lock().batches.get(&height).cloned()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().mempool.len()
    }
}

impl MempoolReader for MemoryStore {
    fn list_pending_transactions(&self) -> Result<Vec<PendingTransaction>, StorageError> {
        let guard = self.inner.lock();
        let pending: Vec<_> = guard
            .mempool
            .iter()
            .filter(|tx| tx.status == TxStatus::Pending)
            .cloned()
            .collect();
        if pending.is_empty() {
            return Err(StorageError::NotFound);
        }
        Ok(pending)
    }
}

impl AccountRepository for MemoryStore {
    fn account_by_index(&self, account_index: u32) -> Result<AccountState, StorageError> {
        self.inner
            .lock()
            .accounts
            .get(&account_index)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

impl LiquidityRepository for MemoryStore {
    fn liquidity_by_pair_index(&self, pair_index: u16) -> Result<LiquidityPool, StorageError> {
        self.inner
            .lock()
            .liquidity
            .get(&pair_index)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

impl NftRepository for MemoryStore {
    fn nft_by_index(&self, nft_index: u64) -> Result<Nft, StorageError> {
        self.inner
            .lock()
            .nfts
            .get(&nft_index)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

impl BlockRepository for MemoryStore {
    fn current_height(&self) -> Result<i64, StorageError> {
        let guard = self.inner.lock();
        guard
            .blocks
            .keys()
            .next_back()
            .copied()
            .ok_or(StorageError::NotFound)
    }

    fn block_by_height(&self, height: i64) -> Result<Block, StorageError> {
        self.inner
            .lock()
            .blocks
            .get(&height)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn persist_committed_block(&self, batch: CommittedBatch) -> Result<(), StorageError> {
        // One lock scope: readers never observe a partially applied batch.
        let mut guard = self.inner.lock();
        for tx in &batch.updated_txs {
            if let Some(slot) = guard.mempool.iter_mut().find(|entry| entry.id == tx.id) {
                *slot = tx.clone();
            }
        }
        for account in &batch.account_upserts {
            guard.accounts.insert(account.account_index, account.clone());
        }
        for pool in &batch.liquidity_upserts {
            guard.liquidity.insert(pool.pair_index, pool.clone());
        }
        for nft in batch.nft_inserts.iter().chain(batch.nft_upserts.iter()) {
            guard.nfts.insert(nft.nft_index, nft.clone());
        }
        guard.blocks.insert(batch.block.height, batch.block.clone());
        guard.batches.insert(batch.block.height, batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_types::{BlockStatus, TxContent};

    fn pending_tx(id: u64) -> PendingTransaction {
        PendingTransaction {
            id,
            content: TxContent::Empty,
            account_index: None,
            nonce: None,
            expired_at_ms: None,
            details: Vec::new(),
            status: TxStatus::Pending,
            block_height: None,
            state_root: None,
            created_at_ms: 0,
        }
    }

    fn block(height: i64) -> Block {
        Block {
            height,
            commitment: [0u8; 32],
            state_root: [0u8; 32],
            priority_operations: 0,
            pending_onchain_operations_hash: [0u8; 32],
            public_data: Vec::new(),
            public_data_offsets: Vec::new(),
            created_at_ms: 0,
            txs: Vec::new(),
            status: BlockStatus::Pending,
        }
    }

    #[test]
    fn empty_mempool_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.list_pending_transactions(),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn no_blocks_yet_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.current_height(), Err(StorageError::NotFound)));
    }

    #[test]
    fn persisted_batch_updates_mempool_and_height() {
        let store = MemoryStore::new();
        store.push_pending_transaction(pending_tx(1));
        let mut executed = pending_tx(1);
        executed.status = TxStatus::Success;
        executed.block_height = Some(1);
        let batch = CommittedBatch {
            block: block(1),
            updated_txs: vec![executed],
            account_upserts: Vec::new(),
            account_history: Vec::new(),
            liquidity_upserts: Vec::new(),
            liquidity_history: Vec::new(),
            nft_inserts: Vec::new(),
            nft_upserts: Vec::new(),
            nft_history: Vec::new(),
        };
        store.persist_committed_block(batch).unwrap();
        assert_eq!(store.current_height().unwrap(), 1);
        // The executed transaction is no longer pending.
        assert!(matches!(
            store.list_pending_transactions(),
            Err(StorageError::NotFound)
        ));
        assert!(store.batch_at(1).is_some());
    }
}
