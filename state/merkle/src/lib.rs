//! Sparse Merkle tree state for the rollup commitments.
//!
//! Each tree kind has a fixed depth; untouched leaves default to the
//! all-zero digest, so an empty tree's root is a deterministic constant
//! (`nil_root`). Trees support point updates and authentication-path
//! queries by integer index, which is all the committer and witness
//! builder need.

use std::collections::HashMap;

use thiserror::Error;

use rollup_crypto::{merkle_node, Digest, ZERO_DIGEST};

pub mod chain;
pub mod leaves;

pub use chain::ChainTrees;

/// Depth of the top-level account tree.
pub const ACCOUNT_MERKLE_LEVELS: usize = 32;
/// Depth of each per-account asset sub-tree.
pub const ASSET_MERKLE_LEVELS: usize = 16;
/// Depth of the liquidity-pair tree.
pub const LIQUIDITY_MERKLE_LEVELS: usize = 16;
/// Depth of the NFT tree.
pub const NFT_MERKLE_LEVELS: usize = 40;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("tree depth must be greater than zero")]
    InvalidDepth,
    #[error("leaf index {index} is out of range for depth {depth}")]
    LeafOutOfRange { index: u64, depth: usize },
}

/// Authenticated index-to-digest map of fixed depth.
#[derive(Clone, Debug)]
pub struct SparseMerkleTree {
    depth: usize,
    // Interior nodes keyed by (level, position); level 0 holds leaves.
    nodes: HashMap<(usize, u64), Digest>,
    default_nodes: Vec<Digest>,
}

impl SparseMerkleTree {
    pub fn new(depth: usize) -> Result<Self, MerkleError> {
        if depth == 0 {
            return Err(MerkleError::InvalidDepth);
        }
        Ok(Self {
            depth,
            nodes: HashMap::new(),
            default_nodes: default_nodes(depth),
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Root of an all-empty tree of the given depth.
    pub fn nil_root(depth: usize) -> Digest {
        *default_nodes(depth).last().expect("non-empty defaults")
    }

    pub fn root(&self) -> Digest {
        self.node(self.depth, 0)
    }

    pub fn leaf(&self, index: u64) -> Result<Digest, MerkleError> {
        self.check_range(index)?;
        Ok(self.node(0, index))
    }

    /// Set the leaf at `index` and recompute the path to the root.
    pub fn update(&mut self, index: u64, leaf: Digest) -> Result<(), MerkleError> {
        self.check_range(index)?;
        self.nodes.insert((0, index), leaf);
        let mut position = index;
        for level in 0..self.depth {
            let sibling = self.node(level, position ^ 1);
            let current = self.node(level, position);
            let parent = if position & 1 == 0 {
                merkle_node(&current, &sibling)
            } else {
                merkle_node(&sibling, &current)
            };
            position >>= 1;
            self.nodes.insert((level + 1, position), parent);
        }
        Ok(())
    }

    /// Sibling digests along the path from `index` to the root,
    /// leaf level first; always exactly `depth` entries.
    pub fn proof(&self, index: u64) -> Result<Vec<Digest>, MerkleError> {
        self.check_range(index)?;
        let mut path = Vec::with_capacity(self.depth);
        let mut position = index;
        for level in 0..self.depth {
            path.push(self.node(level, position ^ 1));
            position >>= 1;
        }
        Ok(path)
    }

    /// Recompute a root from a leaf and its authentication path.
    pub fn verify_path(depth: usize, index: u64, leaf: &Digest, path: &[Digest]) -> Option<Digest> {
        if path.len() != depth {
            return None;
        }
        let mut current = *leaf;
        let mut position = index;
        for sibling in path {
            current = if position & 1 == 0 {
                merkle_node(&current, sibling)
            } else {
                merkle_node(sibling, &current)
            };
            position >>= 1;
        }
        Some(current)
    }

    fn node(&self, level: usize, position: u64) -> Digest {
        self.nodes
            .get(&(level, position))
            .copied()
            .unwrap_or(self.default_nodes[level])
    }

    fn check_range(&self, index: u64) -> Result<(), MerkleError> {
        let capacity = 1u64.checked_shl(self.depth as u32).unwrap_or(u64::MAX);
        if index >= capacity {
            return Err(MerkleError::LeafOutOfRange {
                index,
                depth: self.depth,
            });
        }
        Ok(())
    }
}

fn default_nodes(depth: usize) -> Vec<Digest> {
    let mut defaults = Vec::with_capacity(depth + 1);
    defaults.push(ZERO_DIGEST);
    for level in 0..depth {
        let prev = defaults[level];
        defaults.push(merkle_node(&prev, &prev));
    }
    defaults
}
