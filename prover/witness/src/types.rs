//! Witness record types and fixed-size proof conversion.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use rollup_crypto::Digest;
use rollup_storage::StorageError;
use rollup_types::{AccountState, AssetBalance, LiquidityPool, Nft, TxContent, TxType};
use state_merkle::{
    MerkleError, ACCOUNT_MERKLE_LEVELS, ASSET_MERKLE_LEVELS, LIQUIDITY_MERKLE_LEVELS,
    NFT_MERKLE_LEVELS,
};

#[derive(Debug, Error)]
pub enum WitnessError {
    /// The empty kind has no circuit representation.
    #[error("tx {tx_id} has the empty transaction type, which has no witness")]
    EmptyTransaction { tx_id: u64 },
    #[error("proof has {got} siblings, tree depth requires exactly {expected}")]
    InvalidProofSize { expected: usize, got: usize },
    #[error("account {account_index} referenced by the witness is not registered")]
    AccountNotRegistered { account_index: u32 },
    #[error(transparent)]
    Merkle(#[from] MerkleError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A sibling-hash array whose length is pinned to the tree depth at the
/// type level. Deserialization re-checks the length so a wire payload can
/// never smuggle in a short or over-long proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedProof<const N: usize>(pub [Digest; N]);

pub type AccountProof = FixedProof<ACCOUNT_MERKLE_LEVELS>;
pub type AssetProof = FixedProof<ASSET_MERKLE_LEVELS>;
pub type LiquidityProof = FixedProof<LIQUIDITY_MERKLE_LEVELS>;
pub type NftProof = FixedProof<NFT_MERKLE_LEVELS>;

impl<const N: usize> FixedProof<N> {
    pub fn siblings(&self) -> &[Digest] {
        &self.0
    }
}

/// Convert a variable-length sibling array into a fixed-depth proof,
/// failing for any length other than exactly `N`.
pub fn to_fixed_proof<const N: usize>(siblings: Vec<Digest>) -> Result<FixedProof<N>, WitnessError> {
    let got = siblings.len();
    siblings
        .try_into()
        .map(FixedProof)
        .map_err(|_| WitnessError::InvalidProofSize { expected: N, got })
}

impl<const N: usize> Serialize for FixedProof<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedProof<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let siblings = Vec::<Digest>::deserialize(deserializer)?;
        let got = siblings.len();
        siblings
            .try_into()
            .map(FixedProof)
            .map_err(|_| D::Error::invalid_length(got, &"exactly the tree depth"))
    }
}

/// One (account, asset) leaf the circuit verifies: the balance record, its
/// leaf hash, and its path in the account's asset sub-tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetLeafWitness {
    pub asset_id: u16,
    pub balance: AssetBalance,
    pub leaf: Digest,
    pub proof: AssetProof,
}

/// One referenced account: its record, its leaf in the top-level account
/// tree, and the asset leaves the transaction touches under it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountWitness {
    pub account_index: u32,
    pub account: AccountState,
    pub leaf: Digest,
    pub proof: AccountProof,
    pub assets: Vec<AssetLeafWitness>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidityWitness {
    pub pair_index: u16,
    pub pool: LiquidityPool,
    pub leaf: Digest,
    pub proof: LiquidityProof,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NftWitness {
    pub nft_index: u64,
    /// `None` for a leaf the transaction is about to mint into.
    pub nft: Option<Nft>,
    pub leaf: Digest,
    pub proof: NftProof,
}

/// The full witness for one executed transaction, consumed by the prover.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxWitness {
    pub tx_id: u64,
    pub tx_type: TxType,
    pub content: TxContent,
    /// Block height at which the witnessed state is final.
    pub finality_block_nr: i64,
    pub state_root: Digest,
    pub accounts: Vec<AccountWitness>,
    pub liquidity: Option<LiquidityWitness>,
    pub nft: Option<NftWitness>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_crypto::ZERO_DIGEST;

    #[test]
    fn fixed_proof_rejects_wrong_lengths() {
        for bad in [0usize, 1, ASSET_MERKLE_LEVELS - 1, ASSET_MERKLE_LEVELS + 1] {
            let result = to_fixed_proof::<ASSET_MERKLE_LEVELS>(vec![ZERO_DIGEST; bad]);
            assert!(matches!(
                result,
                Err(WitnessError::InvalidProofSize {
                    expected: ASSET_MERKLE_LEVELS,
                    ..
                })
            ));
        }
        assert!(to_fixed_proof::<ASSET_MERKLE_LEVELS>(vec![ZERO_DIGEST; ASSET_MERKLE_LEVELS]).is_ok());
    }

    #[test]
    fn every_tree_depth_is_enforced() {
        assert!(to_fixed_proof::<ACCOUNT_MERKLE_LEVELS>(vec![ZERO_DIGEST; 31]).is_err());
        assert!(to_fixed_proof::<LIQUIDITY_MERKLE_LEVELS>(Vec::new()).is_err());
        assert!(to_fixed_proof::<NFT_MERKLE_LEVELS>(vec![ZERO_DIGEST; 41]).is_err());
        assert!(to_fixed_proof::<NFT_MERKLE_LEVELS>(vec![ZERO_DIGEST; 40]).is_ok());
    }

    #[test]
    fn serde_round_trip_preserves_length() {
        let proof = to_fixed_proof::<LIQUIDITY_MERKLE_LEVELS>(vec![[7u8; 32]; 16]).unwrap();
        let encoded = serde_json::to_string(&proof).unwrap();
        let decoded: LiquidityProof = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn deserializing_a_short_proof_fails() {
        let encoded = serde_json::to_string(&vec![[0u8; 32]; 15]).unwrap();
        assert!(serde_json::from_str::<LiquidityProof>(&encoded).is_err());
    }
}
