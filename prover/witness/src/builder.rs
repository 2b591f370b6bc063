//! Per-transaction witness construction from the state trees.

use rollup_storage::{AccountRepository, LiquidityRepository, NftRepository, StorageError};
use rollup_types::{LiquidityPool, PendingTransaction, TxContent};
use state_merkle::ChainTrees;

use crate::types::{
    to_fixed_proof, AccountWitness, AssetLeafWitness, LiquidityWitness, NftWitness, TxWitness,
    WitnessError,
};

/// Leaves one transaction's circuit gadget must verify: referenced accounts
/// with the asset ids touched under each, at most one pool, at most one NFT.
#[derive(Default)]
struct Footprint {
    accounts: Vec<(u32, Vec<u16>)>,
    pair: Option<u16>,
    nft: Option<u64>,
}

impl Footprint {
    fn account(&mut self, account_index: u32, asset_ids: &[u16]) {
        let position = match self
            .accounts
            .iter()
            .position(|(index, _)| *index == account_index)
        {
            Some(position) => position,
            None => {
                self.accounts.push((account_index, Vec::new()));
                self.accounts.len() - 1
            }
        };
        let touched = &mut self.accounts[position].1;
        for asset_id in asset_ids {
            if !touched.contains(asset_id) {
                touched.push(*asset_id);
            }
        }
    }
}

/// Assembles witnesses against a store snapshot and the tree state at the
/// transactions' execution point. Both are borrowed; the helper never
/// mutates state.
pub struct WitnessHelper<'a, S> {
    store: &'a S,
    trees: &'a ChainTrees,
}

impl<'a, S> WitnessHelper<'a, S>
where
    S: AccountRepository + LiquidityRepository + NftRepository,
{
    pub fn new(store: &'a S, trees: &'a ChainTrees) -> Self {
        Self { store, trees }
    }

    /// Build the witness for one executed transaction. Dispatches
    /// exhaustively over the transaction kinds; the empty kind is rejected
    /// because the circuit has no representation for it.
    pub fn construct_tx_witness(
        &self,
        tx: &PendingTransaction,
        finality_block_nr: i64,
    ) -> Result<TxWitness, WitnessError> {
        let footprint = footprint(tx)?;

        let mut accounts = Vec::with_capacity(footprint.accounts.len());
        for (account_index, asset_ids) in &footprint.accounts {
            accounts.push(self.account_witness(*account_index, asset_ids)?);
        }
        let liquidity = match footprint.pair {
            Some(pair_index) => Some(self.liquidity_witness(pair_index)?),
            None => None,
        };
        let nft = match footprint.nft {
            Some(nft_index) => Some(self.nft_witness(nft_index)?),
            None => None,
        };

        Ok(TxWitness {
            tx_id: tx.id,
            tx_type: tx.tx_type(),
            content: tx.content.clone(),
            finality_block_nr,
            state_root: self.trees.state_root(),
            accounts,
            liquidity,
            nft,
        })
    }

    fn account_witness(
        &self,
        account_index: u32,
        asset_ids: &[u16],
    ) -> Result<AccountWitness, WitnessError> {
        let account = match self.store.account_by_index(account_index) {
            Ok(account) => account,
            Err(StorageError::NotFound) => {
                return Err(WitnessError::AccountNotRegistered { account_index })
            }
            Err(err) => return Err(err.into()),
        };
        let asset_tree = self
            .trees
            .asset_tree(account_index)
            .ok_or(WitnessError::AccountNotRegistered { account_index })?;

        let mut assets = Vec::with_capacity(asset_ids.len());
        for asset_id in asset_ids {
            let index = *asset_id as u64;
            assets.push(AssetLeafWitness {
                asset_id: *asset_id,
                balance: account.assets.get(asset_id).cloned().unwrap_or_default(),
                leaf: asset_tree.leaf(index)?,
                proof: to_fixed_proof(asset_tree.proof(index)?)?,
            });
        }

        let index = account_index as u64;
        Ok(AccountWitness {
            account_index,
            leaf: self.trees.account_tree.leaf(index)?,
            proof: to_fixed_proof(self.trees.account_tree.proof(index)?)?,
            account,
            assets,
        })
    }

    fn liquidity_witness(&self, pair_index: u16) -> Result<LiquidityWitness, WitnessError> {
        let pool = match self.store.liquidity_by_pair_index(pair_index) {
            Ok(pool) => pool,
            // A pair-creation transaction witnesses the zeroed pool.
            Err(StorageError::NotFound) => LiquidityPool::empty(pair_index, 0, 0),
            Err(err) => return Err(err.into()),
        };
        let index = pair_index as u64;
        Ok(LiquidityWitness {
            pair_index,
            pool,
            leaf: self.trees.liquidity_tree.leaf(index)?,
            proof: to_fixed_proof(self.trees.liquidity_tree.proof(index)?)?,
        })
    }

    fn nft_witness(&self, nft_index: u64) -> Result<NftWitness, WitnessError> {
        let nft = match self.store.nft_by_index(nft_index) {
            Ok(nft) => Some(nft),
            Err(StorageError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };
        Ok(NftWitness {
            nft_index,
            nft,
            leaf: self.trees.nft_tree.leaf(nft_index)?,
            proof: to_fixed_proof(self.trees.nft_tree.proof(nft_index)?)?,
        })
    }
}

fn footprint(tx: &PendingTransaction) -> Result<Footprint, WitnessError> {
    let mut fp = Footprint::default();
    match &tx.content {
        TxContent::Empty => return Err(WitnessError::EmptyTransaction { tx_id: tx.id }),
        TxContent::Registration { account_index, .. } => {
            fp.account(*account_index, &[]);
        }
        TxContent::CreatePair { pair_index, .. }
        | TxContent::UpdatePairRate { pair_index, .. } => {
            fp.pair = Some(*pair_index);
        }
        TxContent::Deposit {
            account_index,
            asset_id,
            ..
        } => {
            fp.account(*account_index, &[*asset_id]);
        }
        TxContent::DepositNft {
            account_index,
            nft_index,
            ..
        } => {
            fp.account(*account_index, &[]);
            fp.nft = Some(*nft_index);
        }
        TxContent::Transfer {
            from_account_index,
            to_account_index,
            asset_id,
            fee_asset_id,
            ..
        } => {
            fp.account(*from_account_index, &[*asset_id, *fee_asset_id]);
            fp.account(*to_account_index, &[*asset_id]);
        }
        TxContent::Swap {
            account_index,
            pair_index,
            asset_a_id,
            asset_b_id,
            fee_asset_id,
            ..
        } => {
            fp.account(*account_index, &[*asset_a_id, *asset_b_id, *fee_asset_id]);
            fp.pair = Some(*pair_index);
        }
        TxContent::AddLiquidity {
            account_index,
            pair_index,
            fee_asset_id,
            ..
        }
        | TxContent::RemoveLiquidity {
            account_index,
            pair_index,
            fee_asset_id,
            ..
        } => {
            fp.account(*account_index, &[*fee_asset_id]);
            fp.pair = Some(*pair_index);
        }
        TxContent::Withdraw {
            account_index,
            asset_id,
            fee_asset_id,
            ..
        } => {
            fp.account(*account_index, &[*asset_id, *fee_asset_id]);
        }
        TxContent::CreateCollection {
            account_index,
            fee_asset_id,
            ..
        }
        | TxContent::CancelOffer {
            account_index,
            fee_asset_id,
            ..
        } => {
            fp.account(*account_index, &[*fee_asset_id]);
        }
        TxContent::MintNft {
            creator_account_index,
            to_account_index,
            nft_index,
            fee_asset_id,
            ..
        } => {
            fp.account(*creator_account_index, &[*fee_asset_id]);
            fp.account(*to_account_index, &[]);
            fp.nft = Some(*nft_index);
        }
        TxContent::TransferNft {
            from_account_index,
            to_account_index,
            nft_index,
            fee_asset_id,
            ..
        } => {
            fp.account(*from_account_index, &[*fee_asset_id]);
            fp.account(*to_account_index, &[]);
            fp.nft = Some(*nft_index);
        }
        TxContent::AtomicMatch {
            submitter_account_index,
            buyer_account_index,
            seller_account_index,
            nft_index,
            asset_id,
            ..
        } => {
            fp.account(*submitter_account_index, &[*asset_id]);
            fp.account(*buyer_account_index, &[*asset_id]);
            fp.account(*seller_account_index, &[*asset_id]);
            fp.nft = Some(*nft_index);
        }
        TxContent::WithdrawNft {
            account_index,
            creator_account_index,
            nft_index,
            fee_asset_id,
            ..
        } => {
            fp.account(*account_index, &[*fee_asset_id]);
            fp.account(*creator_account_index, &[]);
            fp.nft = Some(*nft_index);
        }
        TxContent::FullExit {
            account_index,
            asset_id,
            ..
        } => {
            fp.account(*account_index, &[*asset_id]);
        }
        TxContent::FullExitNft {
            account_index,
            creator_account_index,
            nft_index,
            ..
        } => {
            fp.account(*account_index, &[]);
            fp.account(*creator_account_index, &[]);
            fp.nft = Some(*nft_index);
        }
    }
    Ok(fp)
}
