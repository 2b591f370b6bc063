//! Balance representations and the typed deltas applied to them.

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};

use rollup_crypto::Digest;

/// Asset kind tag carried by every transaction detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AssetKind {
    General = 1,
    Liquidity = 2,
    Nft = 3,
    CollectionNonce = 4,
}

/// One (account, asset) balance record. All components are unbounded
/// unsigned integers; negative intermediate results are rejected by the
/// delta engine, never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub balance: BigUint,
    pub lp_amount: BigUint,
    pub offer_canceled_or_finalized: BigUint,
}

/// Signed component-wise delta against an [`AssetBalance`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDelta {
    pub balance: BigInt,
    pub lp_amount: BigInt,
    pub offer_canceled_or_finalized: BigInt,
}

/// One trading pair's pool state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub pair_index: u16,
    pub asset_a_id: u16,
    pub asset_a: BigUint,
    pub asset_b_id: u16,
    pub asset_b: BigUint,
    pub lp_supply: BigUint,
    pub k_last: BigUint,
    pub fee_rate: i64,
    pub treasury_account_index: u32,
    pub treasury_rate: i64,
}

impl LiquidityPool {
    /// Zeroed pool for a pair-creation transaction.
    pub fn empty(pair_index: u16, asset_a_id: u16, asset_b_id: u16) -> Self {
        Self {
            pair_index,
            asset_a_id,
            asset_a: BigUint::default(),
            asset_b_id,
            asset_b: BigUint::default(),
            lp_supply: BigUint::default(),
            k_last: BigUint::default(),
            fee_rate: 0,
            treasury_account_index: 0,
            treasury_rate: 0,
        }
    }
}

/// Delta applied to a pool: reserves and LP supply move by signed amounts,
/// while the checkpoint and rate fields are replaced outright.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityDelta {
    pub asset_a_id: u16,
    pub asset_b_id: u16,
    pub asset_a: BigInt,
    pub asset_b: BigInt,
    pub lp_supply: BigInt,
    pub k_last: BigUint,
    pub fee_rate: i64,
    pub treasury_account_index: u32,
    pub treasury_rate: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NftStatus {
    #[default]
    Confirmed,
    Withdrawn,
}

/// One non-fungible token's authenticated record. Never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    pub nft_index: u64,
    pub creator_account_index: u32,
    pub owner_account_index: u32,
    pub content_hash: Digest,
    pub origin_address: [u8; 20],
    pub origin_token_id: BigUint,
    pub creator_royalty_rate: i64,
    pub collection_id: i64,
    pub status: NftStatus,
}

/// Whether an NFT delta mints a new token or replaces an existing record.
/// The flag is explicit in the detail rather than inferred from whether the
/// index happened to be cached when the delta was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NftMutationKind {
    Mint,
    Update,
}

/// NFT deltas are not additive: the mutation carries the token's full new
/// field set (ownership transfer, mint, deposit).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NftMutation {
    pub kind: NftMutationKind,
    pub nft: Nft,
}

/// Tagged balance effect, one variant per [`AssetKind`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BalanceDelta {
    General(AssetDelta),
    Liquidity(LiquidityDelta),
    Nft(NftMutation),
    CollectionNonce(i64),
}

impl BalanceDelta {
    pub fn kind(&self) -> AssetKind {
        match self {
            BalanceDelta::General(_) => AssetKind::General,
            BalanceDelta::Liquidity(_) => AssetKind::Liquidity,
            BalanceDelta::Nft(_) => AssetKind::Nft,
            BalanceDelta::CollectionNonce(_) => AssetKind::CollectionNonce,
        }
    }
}
