//! Transaction types, typed content, and per-detail balance effects.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rollup_crypto::Digest;

use crate::asset::{AssetKind, BalanceDelta};

/// Closed set of transaction kinds. Adding a kind is a compile-time event:
/// every component dispatches over this enum exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    Empty = 0,
    Registration = 1,
    CreatePair = 2,
    UpdatePairRate = 3,
    Deposit = 4,
    DepositNft = 5,
    Transfer = 6,
    Swap = 7,
    AddLiquidity = 8,
    RemoveLiquidity = 9,
    Withdraw = 10,
    CreateCollection = 11,
    MintNft = 12,
    TransferNft = 13,
    AtomicMatch = 14,
    CancelOffer = 15,
    WithdrawNft = 16,
    FullExit = 17,
    FullExitNft = 18,
}

#[derive(Debug, Error)]
#[error("unknown transaction type tag {0}")]
pub struct UnknownTxType(pub u8);

impl TryFrom<u8> for TxType {
    type Error = UnknownTxType;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => TxType::Empty,
            1 => TxType::Registration,
            2 => TxType::CreatePair,
            3 => TxType::UpdatePairRate,
            4 => TxType::Deposit,
            5 => TxType::DepositNft,
            6 => TxType::Transfer,
            7 => TxType::Swap,
            8 => TxType::AddLiquidity,
            9 => TxType::RemoveLiquidity,
            10 => TxType::Withdraw,
            11 => TxType::CreateCollection,
            12 => TxType::MintNft,
            13 => TxType::TransferNft,
            14 => TxType::AtomicMatch,
            15 => TxType::CancelOffer,
            16 => TxType::WithdrawNft,
            17 => TxType::FullExit,
            18 => TxType::FullExitNft,
            other => return Err(UnknownTxType(other)),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

/// Typed payload of a transaction, one variant per [`TxType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TxContent {
    Empty,
    Registration {
        account_index: u32,
        account_name: String,
        pub_key: Vec<u8>,
    },
    CreatePair {
        pair_index: u16,
        asset_a_id: u16,
        asset_b_id: u16,
        fee_rate: i64,
        treasury_account_index: u32,
        treasury_rate: i64,
    },
    UpdatePairRate {
        pair_index: u16,
        fee_rate: i64,
        treasury_account_index: u32,
        treasury_rate: i64,
    },
    Deposit {
        account_index: u32,
        asset_id: u16,
        amount: BigUint,
    },
    DepositNft {
        account_index: u32,
        nft_index: u64,
        content_hash: Digest,
        origin_address: [u8; 20],
        origin_token_id: BigUint,
        collection_id: i64,
        creator_royalty_rate: i64,
    },
    Transfer {
        from_account_index: u32,
        to_account_index: u32,
        asset_id: u16,
        amount: BigUint,
        fee_asset_id: u16,
        fee: BigUint,
    },
    Swap {
        account_index: u32,
        pair_index: u16,
        asset_a_id: u16,
        asset_a_amount: BigUint,
        asset_b_id: u16,
        asset_b_amount: BigUint,
        fee_asset_id: u16,
        fee: BigUint,
    },
    AddLiquidity {
        account_index: u32,
        pair_index: u16,
        asset_a_amount: BigUint,
        asset_b_amount: BigUint,
        lp_amount: BigUint,
        fee_asset_id: u16,
        fee: BigUint,
    },
    RemoveLiquidity {
        account_index: u32,
        pair_index: u16,
        asset_a_amount: BigUint,
        asset_b_amount: BigUint,
        lp_amount: BigUint,
        fee_asset_id: u16,
        fee: BigUint,
    },
    Withdraw {
        account_index: u32,
        to_address: [u8; 20],
        asset_id: u16,
        amount: BigUint,
        fee_asset_id: u16,
        fee: BigUint,
    },
    CreateCollection {
        account_index: u32,
        collection_id: i64,
        fee_asset_id: u16,
        fee: BigUint,
    },
    MintNft {
        creator_account_index: u32,
        to_account_index: u32,
        nft_index: u64,
        content_hash: Digest,
        collection_id: i64,
        creator_royalty_rate: i64,
        fee_asset_id: u16,
        fee: BigUint,
    },
    TransferNft {
        from_account_index: u32,
        to_account_index: u32,
        nft_index: u64,
        fee_asset_id: u16,
        fee: BigUint,
    },
    AtomicMatch {
        submitter_account_index: u32,
        buyer_account_index: u32,
        seller_account_index: u32,
        nft_index: u64,
        asset_id: u16,
        amount: BigUint,
        buy_offer_id: i64,
        sell_offer_id: i64,
    },
    CancelOffer {
        account_index: u32,
        offer_id: i64,
        fee_asset_id: u16,
        fee: BigUint,
    },
    WithdrawNft {
        account_index: u32,
        to_address: [u8; 20],
        nft_index: u64,
        creator_account_index: u32,
        creator_royalty_rate: i64,
        content_hash: Digest,
        fee_asset_id: u16,
        fee: BigUint,
    },
    FullExit {
        account_index: u32,
        asset_id: u16,
        amount: BigUint,
    },
    FullExitNft {
        account_index: u32,
        creator_account_index: u32,
        nft_index: u64,
        content_hash: Digest,
        origin_address: [u8; 20],
        origin_token_id: BigUint,
    },
}

impl TxContent {
    pub fn tx_type(&self) -> TxType {
        match self {
            TxContent::Empty => TxType::Empty,
            TxContent::Registration { .. } => TxType::Registration,
            TxContent::CreatePair { .. } => TxType::CreatePair,
            TxContent::UpdatePairRate { .. } => TxType::UpdatePairRate,
            TxContent::Deposit { .. } => TxType::Deposit,
            TxContent::DepositNft { .. } => TxType::DepositNft,
            TxContent::Transfer { .. } => TxType::Transfer,
            TxContent::Swap { .. } => TxType::Swap,
            TxContent::AddLiquidity { .. } => TxType::AddLiquidity,
            TxContent::RemoveLiquidity { .. } => TxType::RemoveLiquidity,
            TxContent::Withdraw { .. } => TxType::Withdraw,
            TxContent::CreateCollection { .. } => TxType::CreateCollection,
            TxContent::MintNft { .. } => TxType::MintNft,
            TxContent::TransferNft { .. } => TxType::TransferNft,
            TxContent::AtomicMatch { .. } => TxType::AtomicMatch,
            TxContent::CancelOffer { .. } => TxType::CancelOffer,
            TxContent::WithdrawNft { .. } => TxType::WithdrawNft,
            TxContent::FullExit { .. } => TxType::FullExit,
            TxContent::FullExitNft { .. } => TxType::FullExitNft,
        }
    }
}

/// One balance-affecting line item of a transaction.
///
/// `asset_id` is interpreted per delta kind: a fungible asset id, a pair
/// index, an NFT index, or the account index whose collection nonce moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxDetail {
    pub asset_id: u64,
    pub account_index: Option<u32>,
    pub delta: BalanceDelta,
    pub order: u32,
}

impl TxDetail {
    pub fn kind(&self) -> AssetKind {
        self.delta.kind()
    }
}

/// A mempool-submitted operation awaiting inclusion, ordered by `id`
/// (submission sequence). The committer stamps status, block height, and
/// resulting state root when the transaction executes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: u64,
    pub content: TxContent,
    pub account_index: Option<u32>,
    pub nonce: Option<i64>,
    pub expired_at_ms: Option<i64>,
    pub details: Vec<TxDetail>,
    pub status: TxStatus,
    pub block_height: Option<i64>,
    pub state_root: Option<Digest>,
    pub created_at_ms: i64,
}

impl PendingTransaction {
    pub fn tx_type(&self) -> TxType {
        self.content.tx_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for tag in 0u8..=18 {
            let tx_type = TxType::try_from(tag).unwrap();
            assert_eq!(tx_type as u8, tag);
        }
        assert!(TxType::try_from(19).is_err());
        assert!(TxType::try_from(255).is_err());
    }

    #[test]
    fn pending_transaction_serde_round_trip() {
        let tx = PendingTransaction {
            id: 42,
            content: TxContent::Withdraw {
                account_index: 1,
                to_address: [0x11; 20],
                asset_id: 0,
                amount: BigUint::from(250u32),
                fee_asset_id: 0,
                fee: BigUint::from(5u32),
            },
            account_index: Some(1),
            nonce: Some(3),
            expired_at_ms: Some(1_000_000),
            details: Vec::new(),
            status: TxStatus::Pending,
            block_height: None,
            state_root: None,
            created_at_ms: 999,
        };
        let encoded = serde_json::to_string(&tx).unwrap();
        let decoded: PendingTransaction = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn content_maps_to_type() {
        let content = TxContent::Deposit {
            account_index: 1,
            asset_id: 0,
            amount: BigUint::from(100u32),
        };
        assert_eq!(content.tx_type(), TxType::Deposit);
        assert_eq!(TxContent::Empty.tx_type(), TxType::Empty);
    }
}
