//! Shared data model for the rollup state-transition core.
//!
//! Everything here is plain data: transactions and their typed content,
//! account / liquidity / NFT records, balance deltas, and finalized blocks.
//! The committer, witness builder, and storage layers all speak these types.

pub mod account;
pub mod asset;
pub mod block;
pub mod tx;

pub use account::{AccountHistory, AccountState, AccountStatus};
pub use asset::{
    AssetBalance, AssetDelta, AssetKind, BalanceDelta, LiquidityDelta, LiquidityPool, Nft,
    NftMutation, NftMutationKind, NftStatus,
};
pub use block::{
    Block, BlockStatus, CommittedBatch, LiquidityHistory, NftHistory, StoredBlockInfo,
};
pub use tx::{PendingTransaction, TxContent, TxDetail, TxStatus, TxType, UnknownTxType};
