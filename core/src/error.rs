//! Committer error classes.
//!
//! Recoverable-per-transaction conditions (insufficient balance, expiry)
//! never surface here; they mark the transaction Failed and the pass
//! continues. Everything in [`CommitterError`] is either pass-fatal or a
//! collaborator failure propagated unchanged.

use thiserror::Error;

use rollup_storage::StorageError;
use rollup_types::{NftMutationKind, TxType};
use state_merkle::MerkleError;

use crate::pubdata::PubdataError;

#[derive(Debug, Error)]
pub enum CommitterError {
    /// The time-pressure rule refused an under-filled block; nothing was
    /// persisted and the backlog is untouched.
    #[error("not enough transactions to fill a block")]
    NotEnoughTransactions,

    #[error("block {height} would contain no transactions")]
    EmptyBlock { height: i64 },

    /// By protocol rule the first transaction touching any account index
    /// must be its registration.
    #[error("account {account_index} is unregistered but tx {tx_id} has type {tx_type:?}")]
    AccountNotRegistered {
        account_index: u32,
        tx_id: u64,
        tx_type: TxType,
    },

    /// Registration must create the next asset sub-tree in sequence.
    #[error("registration expected account index {expected}, got {got}")]
    UnexpectedAccountIndex { expected: u32, got: u32 },

    #[error("invalid nonce for account {account_index}: expected {expected}, got {got}")]
    InvalidNonce {
        account_index: u32,
        expected: i64,
        got: i64,
    },

    #[error(
        "invalid collection nonce for account {account_index}: expected {expected}, got {got}"
    )]
    InvalidCollectionNonce {
        account_index: u32,
        expected: i64,
        got: i64,
    },

    /// Detail asset ids index 16-bit tree positions; a wider id would alias
    /// a low index if cast blindly.
    #[error("asset id {asset_id} in tx {tx_id} exceeds the 16-bit index range")]
    AssetIdOutOfRange { asset_id: u64, tx_id: u64 },

    /// An NFT mint referenced an existing index, or an update referenced a
    /// missing one.
    #[error("conflicting {kind:?} mutation for nft {nft_index}")]
    NftMutationConflict {
        nft_index: u64,
        kind: NftMutationKind,
    },

    /// A detail or nonce referenced an account, but the transaction names
    /// no account index to resolve it against.
    #[error("tx {tx_id} requires an account context but names none")]
    MissingAccountContext { tx_id: u64 },

    #[error(transparent)]
    Pubdata(#[from] PubdataError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
