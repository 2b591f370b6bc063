//! The commit pass: backlog to finalized blocks.
//!
//! A pass slices the pending backlog into block-sized slots. Each slot
//! executes its transactions in submission order against a working copy of
//! the touched records, updates the four state trees, accumulates public
//! data and the on-chain operations hash, and persists the whole slot as
//! one atomic batch. Transaction effects are staged first and committed
//! only when every detail validates, so a rejected transaction never
//! leaves a partially mutated leaf behind.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use rollup_crypto::{block_commitment, EMPTY_STRING_KECCAK};
use rollup_storage::{
    AccountRepository, BlockRepository, LiquidityRepository, MempoolReader, NftRepository,
    StorageError,
};
use rollup_types::{
    AccountHistory, AccountState, AccountStatus, BalanceDelta, Block, BlockStatus, CommittedBatch,
    LiquidityHistory, LiquidityPool, Nft, NftHistory, NftMutationKind, PendingTransaction,
    TxContent, TxStatus,
};
use state_merkle::leaves::{
    account_leaf_hash, asset_leaf_hash, liquidity_leaf_hash, nft_leaf_hash,
};
use state_merkle::ChainTrees;

use crate::balance::{apply_general, apply_liquidity, DeltaError};
use crate::config::CommitterConfig;
use crate::error::CommitterError;
use crate::pubdata::encode_tx_pub_data;

pub struct BlockCommitter<S> {
    store: S,
    config: CommitterConfig,
}

/// Records touched so far in the current slot, read through from the store
/// on first reference. Also remembers which records changed so the
/// persistence batch carries exactly the slot's footprint.
struct SlotState {
    accounts: BTreeMap<u32, AccountState>,
    pools: BTreeMap<u16, LiquidityPool>,
    nfts: BTreeMap<u64, Nft>,
    touched_accounts: BTreeSet<u32>,
    touched_pools: BTreeSet<u16>,
    minted_nfts: BTreeSet<u64>,
    updated_nfts: BTreeSet<u64>,
}

/// One transaction's staged effect: copies of every record it touches,
/// applied to the slot and the trees only if the whole transaction
/// validates. A registration carries its new account here too, so a
/// rejected registration leaves no asset sub-tree or leaf behind.
#[derive(Default)]
struct TxStage {
    accounts: BTreeMap<u32, AccountState>,
    touched_assets: BTreeSet<(u32, u16)>,
    pools: BTreeMap<u16, LiquidityPool>,
    nfts: Vec<(NftMutationKind, Nft)>,
    registered_account: Option<u32>,
}

enum StageOutcome {
    Applied(TxStage),
    Rejected(DeltaError),
}

impl SlotState {
    fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            pools: BTreeMap::new(),
            nfts: BTreeMap::new(),
            touched_accounts: BTreeSet::new(),
            touched_pools: BTreeSet::new(),
            minted_nfts: BTreeSet::new(),
            updated_nfts: BTreeSet::new(),
        }
    }

    fn load_account<S: AccountRepository>(
        &mut self,
        store: &S,
        account_index: u32,
    ) -> Result<Option<&AccountState>, StorageError> {
        if !self.accounts.contains_key(&account_index) {
            match store.account_by_index(account_index) {
                Ok(account) => {
                    self.accounts.insert(account_index, account);
                }
                Err(StorageError::NotFound) => return Ok(None),
                Err(err) => return Err(err),
            }
        }
        Ok(self.accounts.get(&account_index))
    }

    fn load_pool<S: LiquidityRepository>(
        &mut self,
        store: &S,
        pair_index: u16,
    ) -> Result<Option<&LiquidityPool>, StorageError> {
        if !self.pools.contains_key(&pair_index) {
            match store.liquidity_by_pair_index(pair_index) {
                Ok(pool) => {
                    self.pools.insert(pair_index, pool);
                }
                Err(StorageError::NotFound) => return Ok(None),
                Err(err) => return Err(err),
            }
        }
        Ok(self.pools.get(&pair_index))
    }

    fn nft_exists<S: NftRepository>(
        &mut self,
        store: &S,
        nft_index: u64,
    ) -> Result<bool, StorageError> {
        if self.nfts.contains_key(&nft_index) {
            return Ok(true);
        }
        match store.nft_by_index(nft_index) {
            Ok(nft) => {
                self.nfts.insert(nft_index, nft);
                Ok(true)
            }
            Err(StorageError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<S> BlockCommitter<S>
where
    S: MempoolReader + AccountRepository + LiquidityRepository + NftRepository + BlockRepository,
{
    pub fn new(store: S, config: CommitterConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one pass against the wall clock.
    pub fn run_commit_pass(
        &self,
        trees: &mut ChainTrees,
        last_committed_at_ms: i64,
    ) -> Result<Vec<Block>, CommitterError> {
        self.run_commit_pass_at(trees, last_committed_at_ms, unix_time_ms())
    }

    /// Run one pass at an explicit timestamp. The timestamp drives both the
    /// time-pressure rule and transaction expiry, and is stamped into every
    /// block the pass produces.
    pub fn run_commit_pass_at(
        &self,
        trees: &mut ChainTrees,
        last_committed_at_ms: i64,
        now_ms: i64,
    ) -> Result<Vec<Block>, CommitterError> {
        let backlog = match self.store.list_pending_transactions() {
            Ok(txs) => txs,
            Err(StorageError::NotFound) => {
                debug!("backlog empty, nothing to commit");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let mut height = match self.store.current_height() {
            Ok(height) => height,
            Err(StorageError::NotFound) => 0,
            Err(err) => return Err(err.into()),
        };

        let max = self.config.max_txs_per_block.max(1);
        let deadline_passed =
            now_ms.saturating_sub(last_committed_at_ms) >= self.config.max_commit_interval_ms;

        let mut blocks = Vec::new();
        for chunk in backlog.chunks(max) {
            // Prefer full blocks: an under-filled trailing slot waits for
            // more transactions unless the commit deadline has passed.
            if chunk.len() < max && !deadline_passed {
                break;
            }
            height += 1;
            let block = self.commit_slot(trees, chunk, height, now_ms)?;
            blocks.push(block);
        }
        if blocks.is_empty() {
            return Err(CommitterError::NotEnoughTransactions);
        }
        Ok(blocks)
    }

    fn commit_slot(
        &self,
        trees: &mut ChainTrees,
        chunk: &[PendingTransaction],
        height: i64,
        now_ms: i64,
    ) -> Result<Block, CommitterError> {
        let mut slot = SlotState::new();
        let mut pub_data = Vec::new();
        let mut offsets = Vec::new();
        let mut priority_operations = 0u32;
        let mut running_hash = EMPTY_STRING_KECCAK;
        let mut block_txs = Vec::with_capacity(chunk.len());

        for pending in chunk {
            let mut tx = pending.clone();

            if matches!(tx.expired_at_ms, Some(expiry) if expiry != 0 && expiry < now_ms) {
                warn!(tx_id = tx.id, "transaction expired before inclusion");
                tx.status = TxStatus::Failed;
                tx.block_height = Some(height);
                tx.state_root = Some(trees.state_root());
                block_txs.push(tx);
                continue;
            }

            if let Some(nonce) = tx.nonce {
                let account_index = tx
                    .account_index
                    .ok_or(CommitterError::MissingAccountContext { tx_id: tx.id })?;
                let account = slot
                    .load_account(&self.store, account_index)?
                    .ok_or(CommitterError::AccountNotRegistered {
                        account_index,
                        tx_id: tx.id,
                        tx_type: tx.tx_type(),
                    })?;
                let expected = account.nonce + 1;
                if nonce != expected {
                    return Err(CommitterError::InvalidNonce {
                        account_index,
                        expected,
                        got: nonce,
                    });
                }
            }

            let stage = match self.stage_details(&mut slot, trees, &tx)? {
                StageOutcome::Applied(stage) => stage,
                StageOutcome::Rejected(reason) => {
                    warn!(tx_id = tx.id, %reason, "transaction rejected");
                    tx.status = TxStatus::Failed;
                    tx.block_height = Some(height);
                    tx.state_root = Some(trees.state_root());
                    block_txs.push(tx);
                    continue;
                }
            };
            commit_stage(trees, &mut slot, stage, &tx)?;

            let outcome = encode_tx_pub_data(&tx.content, &running_hash)?;
            if outcome.priority_op_delta > 0 {
                offsets.push(pub_data.len() as u32);
                priority_operations += outcome.priority_op_delta;
            }
            running_hash = outcome.new_running_hash;
            pub_data.extend_from_slice(&outcome.pub_data);

            tx.status = TxStatus::Success;
            tx.block_height = Some(height);
            tx.state_root = Some(trees.state_root());
            block_txs.push(tx);
        }

        if block_txs.is_empty() {
            return Err(CommitterError::EmptyBlock { height });
        }

        let state_root = trees.state_root();
        let commitment = block_commitment(height - 1, height, now_ms, &pub_data);
        let block = Block {
            height,
            commitment,
            state_root,
            priority_operations,
            pending_onchain_operations_hash: running_hash,
            public_data: pub_data,
            public_data_offsets: offsets,
            created_at_ms: now_ms,
            txs: block_txs.clone(),
            status: BlockStatus::Pending,
        };

        self.store
            .persist_committed_block(build_batch(&slot, &block, block_txs))?;
        info!(
            height,
            txs = block.txs.len(),
            priority_operations,
            state_root = %hex::encode(state_root),
            "committed block"
        );
        Ok(block)
    }

    /// Stage a registration: the confirmed account record goes into the
    /// transaction's stage, and the asset sub-tree is instantiated only when
    /// the stage commits. Registrations arrive in account-index order by
    /// protocol rule.
    fn stage_registration(
        &self,
        slot: &mut SlotState,
        trees: &ChainTrees,
        stage: &mut TxStage,
        account_index: u32,
        account_name: &str,
        pub_key: &[u8],
    ) -> Result<(), CommitterError> {
        let expected = trees.asset_trees.len() as u32;
        if account_index != expected {
            return Err(CommitterError::UnexpectedAccountIndex {
                expected,
                got: account_index,
            });
        }

        let mut account = match slot.load_account(&self.store, account_index)? {
            Some(existing) => existing.clone(),
            None => AccountState::pending(
                account_index,
                account_name.to_owned(),
                pub_key.to_owned(),
            ),
        };
        account.status = AccountStatus::Confirmed;

        stage.accounts.insert(account_index, account);
        stage.registered_account = Some(account_index);
        Ok(())
    }

    /// Apply every detail of one transaction to staged record copies.
    /// A balance underflow rejects the transaction; everything else the
    /// mempool should never have admitted aborts the pass.
    fn stage_details(
        &self,
        slot: &mut SlotState,
        trees: &ChainTrees,
        tx: &PendingTransaction,
    ) -> Result<StageOutcome, CommitterError> {
        let mut stage = TxStage::default();

        if let TxContent::Registration {
            account_index,
            account_name,
            pub_key,
        } = &tx.content
        {
            self.stage_registration(
                slot,
                trees,
                &mut stage,
                *account_index,
                account_name,
                pub_key,
            )?;
        }

        let mut details = tx.details.clone();
        details.sort_by_key(|detail| detail.order);

        for detail in &details {
            match &detail.delta {
                BalanceDelta::General(delta) => {
                    let account_index = detail
                        .account_index
                        .or(tx.account_index)
                        .ok_or(CommitterError::MissingAccountContext { tx_id: tx.id })?;
                    let base = match stage.accounts.get(&account_index) {
                        Some(staged) => staged.clone(),
                        None => slot
                            .load_account(&self.store, account_index)?
                            .cloned()
                            .ok_or(CommitterError::AccountNotRegistered {
                                account_index,
                                tx_id: tx.id,
                                tx_type: tx.tx_type(),
                            })?,
                    };
                    let registered = trees.asset_tree(account_index).is_some()
                        || stage.registered_account == Some(account_index);
                    if !registered {
                        return Err(CommitterError::AccountNotRegistered {
                            account_index,
                            tx_id: tx.id,
                            tx_type: tx.tx_type(),
                        });
                    }
                    let asset_id = checked_asset_id(detail.asset_id, tx.id)?;
                    let current = base.assets.get(&asset_id).cloned().unwrap_or_default();
                    match apply_general(detail.asset_id, &current, delta) {
                        Ok(applied) => {
                            let mut account = base;
                            account.assets.insert(asset_id, applied);
                            stage.accounts.insert(account_index, account);
                            stage.touched_assets.insert((account_index, asset_id));
                        }
                        Err(reason) => return Ok(StageOutcome::Rejected(reason)),
                    }
                }
                BalanceDelta::Liquidity(delta) => {
                    let pair_index = checked_asset_id(detail.asset_id, tx.id)?;
                    let base = match stage.pools.get(&pair_index) {
                        Some(staged) => staged.clone(),
                        None => match slot.load_pool(&self.store, pair_index)? {
                            Some(pool) => pool.clone(),
                            None => LiquidityPool::empty(
                                pair_index,
                                delta.asset_a_id,
                                delta.asset_b_id,
                            ),
                        },
                    };
                    match apply_liquidity(&base, delta) {
                        Ok(pool) => {
                            stage.pools.insert(pair_index, pool);
                        }
                        Err(reason) => return Ok(StageOutcome::Rejected(reason)),
                    }
                }
                BalanceDelta::Nft(mutation) => {
                    let nft_index = mutation.nft.nft_index;
                    let staged = stage.nfts.iter().any(|(_, nft)| nft.nft_index == nft_index);
                    let exists = staged || slot.nft_exists(&self.store, nft_index)?;
                    let conflict = match mutation.kind {
                        NftMutationKind::Mint => exists,
                        NftMutationKind::Update => !exists,
                    };
                    if conflict {
                        return Err(CommitterError::NftMutationConflict {
                            nft_index,
                            kind: mutation.kind,
                        });
                    }
                    stage.nfts.push((mutation.kind, mutation.nft.clone()));
                }
                BalanceDelta::CollectionNonce(next) => {
                    let account_index = detail
                        .account_index
                        .or(tx.account_index)
                        .ok_or(CommitterError::MissingAccountContext { tx_id: tx.id })?;
                    let mut account = match stage.accounts.get(&account_index) {
                        Some(staged) => staged.clone(),
                        None => slot
                            .load_account(&self.store, account_index)?
                            .cloned()
                            .ok_or(CommitterError::AccountNotRegistered {
                                account_index,
                                tx_id: tx.id,
                                tx_type: tx.tx_type(),
                            })?,
                    };
                    let expected = account.collection_nonce + 1;
                    if *next != expected {
                        return Err(CommitterError::InvalidCollectionNonce {
                            account_index,
                            expected,
                            got: *next,
                        });
                    }
                    account.collection_nonce = *next;
                    stage.accounts.insert(account_index, account);
                }
            }
        }
        Ok(StageOutcome::Applied(stage))
    }
}

/// Fold a validated stage into the slot and the trees: asset leaves first,
/// then each touched account's leaf with its refreshed sub-tree root, then
/// pool and NFT leaves.
fn commit_stage(
    trees: &mut ChainTrees,
    slot: &mut SlotState,
    stage: TxStage,
    tx: &PendingTransaction,
) -> Result<(), CommitterError> {
    let TxStage {
        mut accounts,
        touched_assets,
        pools,
        nfts,
        registered_account,
    } = stage;

    if let Some(account_index) = registered_account {
        let registered = trees.register_asset_tree();
        if registered != account_index {
            return Err(CommitterError::UnexpectedAccountIndex {
                expected: registered,
                got: account_index,
            });
        }
    }

    if let (Some(nonce), Some(account_index)) = (tx.nonce, tx.account_index) {
        if !accounts.contains_key(&account_index) {
            let base = slot.accounts.get(&account_index).cloned().ok_or(
                CommitterError::AccountNotRegistered {
                    account_index,
                    tx_id: tx.id,
                    tx_type: tx.tx_type(),
                },
            )?;
            accounts.insert(account_index, base);
        }
        if let Some(account) = accounts.get_mut(&account_index) {
            account.nonce = nonce;
        }
    }

    for (account_index, asset_id) in &touched_assets {
        let balance = accounts
            .get(account_index)
            .and_then(|account| account.assets.get(asset_id))
            .cloned()
            .unwrap_or_default();
        let leaf = asset_leaf_hash(
            &balance.balance,
            &balance.lp_amount,
            &balance.offer_canceled_or_finalized,
        );
        let tree = trees.asset_tree_mut(*account_index).ok_or(
            CommitterError::AccountNotRegistered {
                account_index: *account_index,
                tx_id: tx.id,
                tx_type: tx.tx_type(),
            },
        )?;
        tree.update(*asset_id as u64, leaf)?;
    }

    for (account_index, mut account) in accounts {
        account.asset_root = trees.asset_root(account_index)?;
        let leaf = account_leaf_hash(
            &account.name,
            &account.pub_key,
            account.nonce,
            account.collection_nonce,
            &account.asset_root,
        );
        trees.account_tree.update(account_index as u64, leaf)?;
        slot.accounts.insert(account_index, account);
        slot.touched_accounts.insert(account_index);
    }

    for (pair_index, pool) in pools {
        let leaf = liquidity_leaf_hash(
            pool.asset_a_id,
            &pool.asset_a,
            pool.asset_b_id,
            &pool.asset_b,
            &pool.lp_supply,
            &pool.k_last,
            pool.fee_rate,
            pool.treasury_account_index,
            pool.treasury_rate,
        );
        trees.liquidity_tree.update(pair_index as u64, leaf)?;
        slot.pools.insert(pair_index, pool);
        slot.touched_pools.insert(pair_index);
    }

    for (kind, nft) in nfts {
        let leaf = nft_leaf_hash(
            nft.creator_account_index,
            nft.owner_account_index,
            &nft.content_hash,
            &nft.origin_address,
            &nft.origin_token_id,
            nft.creator_royalty_rate,
            nft.collection_id,
        );
        trees.nft_tree.update(nft.nft_index, leaf)?;
        match kind {
            NftMutationKind::Mint => {
                slot.minted_nfts.insert(nft.nft_index);
            }
            NftMutationKind::Update => {
                // A token minted and then updated in the same slot is still
                // an insert from the store's point of view.
                if !slot.minted_nfts.contains(&nft.nft_index) {
                    slot.updated_nfts.insert(nft.nft_index);
                }
            }
        }
        slot.nfts.insert(nft.nft_index, nft);
    }

    Ok(())
}

fn build_batch(slot: &SlotState, block: &Block, updated_txs: Vec<PendingTransaction>) -> CommittedBatch {
    let height = block.height;
    let mut account_upserts = Vec::new();
    let mut account_history = Vec::new();
    for index in &slot.touched_accounts {
        if let Some(account) = slot.accounts.get(index) {
            account_upserts.push(account.clone());
            account_history.push(AccountHistory {
                account: account.clone(),
                block_height: height,
            });
        }
    }

    let mut liquidity_upserts = Vec::new();
    let mut liquidity_history = Vec::new();
    for index in &slot.touched_pools {
        if let Some(pool) = slot.pools.get(index) {
            liquidity_upserts.push(pool.clone());
            liquidity_history.push(LiquidityHistory {
                pool: pool.clone(),
                block_height: height,
            });
        }
    }

    let mut nft_inserts = Vec::new();
    let mut nft_upserts = Vec::new();
    let mut nft_history = Vec::new();
    for (index, nft) in &slot.nfts {
        if slot.minted_nfts.contains(index) {
            nft_inserts.push(nft.clone());
        } else if slot.updated_nfts.contains(index) {
            nft_upserts.push(nft.clone());
        } else {
            continue;
        }
        nft_history.push(NftHistory {
            nft: nft.clone(),
            block_height: height,
        });
    }

    CommittedBatch {
        block: block.clone(),
        updated_txs,
        account_upserts,
        account_history,
        liquidity_upserts,
        liquidity_history,
        nft_inserts,
        nft_upserts,
        nft_history,
    }
}

/// Detail asset ids are stored as u64 but index 16-bit tree positions;
/// anything wider would alias a low index after a silent cast.
fn checked_asset_id(asset_id: u64, tx_id: u64) -> Result<u16, CommitterError> {
    u16::try_from(asset_id).map_err(|_| CommitterError::AssetIdOutOfRange { asset_id, tx_id })
}

fn unix_time_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
