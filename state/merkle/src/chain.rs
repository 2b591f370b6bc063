//! The four tree kinds a committer pass owns, bundled together.
//!
//! A `ChainTrees` value is constructor-injected into the committer and the
//! witness builder; it is never global state. A per-account asset sub-tree
//! is instantiated exactly once, at that account's registration.

use crate::leaves::state_root;
use crate::{
    MerkleError, SparseMerkleTree, ACCOUNT_MERKLE_LEVELS, ASSET_MERKLE_LEVELS,
    LIQUIDITY_MERKLE_LEVELS, NFT_MERKLE_LEVELS,
};
use rollup_crypto::Digest;

#[derive(Clone, Debug)]
pub struct ChainTrees {
    pub account_tree: SparseMerkleTree,
    pub asset_trees: Vec<SparseMerkleTree>,
    pub liquidity_tree: SparseMerkleTree,
    pub nft_tree: SparseMerkleTree,
}

impl ChainTrees {
    pub fn new_empty() -> Self {
        Self {
            account_tree: SparseMerkleTree::new(ACCOUNT_MERKLE_LEVELS)
                .expect("account tree depth constant"),
            asset_trees: Vec::new(),
            liquidity_tree: SparseMerkleTree::new(LIQUIDITY_MERKLE_LEVELS)
                .expect("liquidity tree depth constant"),
            nft_tree: SparseMerkleTree::new(NFT_MERKLE_LEVELS).expect("nft tree depth constant"),
        }
    }

    /// Append the asset sub-tree for a newly registered account and return
    /// its index, which must equal the account index being registered.
    pub fn register_asset_tree(&mut self) -> u32 {
        self.asset_trees
            .push(SparseMerkleTree::new(ASSET_MERKLE_LEVELS).expect("asset tree depth constant"));
        (self.asset_trees.len() - 1) as u32
    }

    pub fn asset_tree(&self, account_index: u32) -> Option<&SparseMerkleTree> {
        self.asset_trees.get(account_index as usize)
    }

    pub fn asset_tree_mut(&mut self, account_index: u32) -> Option<&mut SparseMerkleTree> {
        self.asset_trees.get_mut(account_index as usize)
    }

    pub fn asset_root(&self, account_index: u32) -> Result<Digest, MerkleError> {
        match self.asset_tree(account_index) {
            Some(tree) => Ok(tree.root()),
            None => Err(MerkleError::LeafOutOfRange {
                index: account_index as u64,
                depth: ASSET_MERKLE_LEVELS,
            }),
        }
    }

    /// `H(accountRoot, liquidityRoot, nftRoot)`, computed from the current
    /// roots. Callers must have folded asset sub-tree roots back into the
    /// account tree before reading this.
    pub fn state_root(&self) -> Digest {
        state_root(
            &self.account_tree.root(),
            &self.liquidity_tree.root(),
            &self.nft_tree.root(),
        )
    }

    /// State root of an entirely empty instance of the four trees; the
    /// genesis block header commits to this value.
    pub fn nil_state_root() -> Digest {
        state_root(
            &SparseMerkleTree::nil_root(ACCOUNT_MERKLE_LEVELS),
            &SparseMerkleTree::nil_root(LIQUIDITY_MERKLE_LEVELS),
            &SparseMerkleTree::nil_root(NFT_MERKLE_LEVELS),
        )
    }
}

impl Default for ChainTrees {
    fn default() -> Self {
        Self::new_empty()
    }
}
