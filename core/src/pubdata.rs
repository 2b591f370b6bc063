//! Per-transaction-type public data encoding.
//!
//! Each transaction kind maps to a fixed binary layout, padded to 32-byte
//! chunks, published to the settlement layer for auditability. Kinds whose
//! processing originates on the settlement layer count as priority
//! operations; kinds that create an on-chain exit obligation additionally
//! fold their record into the running Keccak hash chain.
//!
//! Variable-length fields (account names, public keys) are committed by
//! their Keccak-256 hash so every record of a kind has the same width.

use num_bigint::BigUint;
use thiserror::Error;

use rollup_crypto::{concat_keccak_hash, keccak256, Digest};
use rollup_types::{TxContent, TxType};

/// Settlement-layer pubdata chunk width in bytes.
pub const PUBDATA_CHUNK_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum PubdataError {
    /// The empty kind has no settlement-layer representation; encountering
    /// it in a backlog is a protocol violation, not a default case.
    #[error("empty transaction type has no pubdata encoding")]
    EmptyTransaction,
    #[error("amount does not fit the 32-byte pubdata field")]
    AmountOverflow,
}

/// Result of encoding one transaction's pubdata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PubDataOutcome {
    /// 1 for priority operations, else 0.
    pub priority_op_delta: u32,
    /// Running on-chain operations hash after this transaction.
    pub new_running_hash: Digest,
    pub pub_data: Vec<u8>,
}

struct PubDataWriter {
    buf: Vec<u8>,
}

impl PubDataWriter {
    fn new(tx_type: TxType) -> Self {
        Self {
            buf: vec![tx_type as u8],
        }
    }

    fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    fn hashed(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(&keccak256(value));
    }

    /// Left-padded 32-byte big-endian amount field.
    fn amount(&mut self, value: &BigUint) -> Result<(), PubdataError> {
        let raw = value.to_bytes_be();
        if raw.len() > 32 {
            return Err(PubdataError::AmountOverflow);
        }
        self.buf.extend_from_slice(&vec![0u8; 32 - raw.len()]);
        self.buf.extend_from_slice(&raw);
        Ok(())
    }

    fn finish(mut self) -> Vec<u8> {
        let rem = self.buf.len() % PUBDATA_CHUNK_BYTES;
        if rem != 0 {
            self.buf.resize(self.buf.len() + PUBDATA_CHUNK_BYTES - rem, 0);
        }
        self.buf
    }
}

/// Encode one transaction's pubdata and fold the running on-chain
/// operations hash where the kind requires it.
pub fn encode_tx_pub_data(
    content: &TxContent,
    old_running_hash: &Digest,
) -> Result<PubDataOutcome, PubdataError> {
    let tx_type = content.tx_type();
    let pub_data = encode_record(content)?;

    let priority_op_delta = match tx_type {
        TxType::Registration
        | TxType::Deposit
        | TxType::DepositNft
        | TxType::FullExit
        | TxType::FullExitNft => 1,
        TxType::Empty
        | TxType::CreatePair
        | TxType::UpdatePairRate
        | TxType::Transfer
        | TxType::Swap
        | TxType::AddLiquidity
        | TxType::RemoveLiquidity
        | TxType::Withdraw
        | TxType::CreateCollection
        | TxType::MintNft
        | TxType::TransferNft
        | TxType::AtomicMatch
        | TxType::CancelOffer
        | TxType::WithdrawNft => 0,
    };

    let new_running_hash = match tx_type {
        TxType::Withdraw | TxType::WithdrawNft | TxType::FullExit | TxType::FullExitNft => {
            concat_keccak_hash(old_running_hash, &pub_data)
        }
        TxType::Empty
        | TxType::Registration
        | TxType::CreatePair
        | TxType::UpdatePairRate
        | TxType::Deposit
        | TxType::DepositNft
        | TxType::Transfer
        | TxType::Swap
        | TxType::AddLiquidity
        | TxType::RemoveLiquidity
        | TxType::CreateCollection
        | TxType::MintNft
        | TxType::TransferNft
        | TxType::AtomicMatch
        | TxType::CancelOffer => *old_running_hash,
    };

    Ok(PubDataOutcome {
        priority_op_delta,
        new_running_hash,
        pub_data,
    })
}

fn encode_record(content: &TxContent) -> Result<Vec<u8>, PubdataError> {
    match content {
        TxContent::Empty => Err(PubdataError::EmptyTransaction),
        TxContent::Registration {
            account_index,
            account_name,
            pub_key,
        } => {
            let mut w = PubDataWriter::new(TxType::Registration);
            w.u32(*account_index);
            w.hashed(account_name.as_bytes());
            w.hashed(pub_key);
            Ok(w.finish())
        }
        // Not yet surfaced to the settlement layer; explicit empty record,
        // never a silent default.
        TxContent::CreatePair { .. }
        | TxContent::UpdatePairRate { .. }
        | TxContent::CreateCollection { .. }
        | TxContent::TransferNft { .. }
        | TxContent::AtomicMatch { .. }
        | TxContent::CancelOffer { .. } => Ok(Vec::new()),
        TxContent::Deposit {
            account_index,
            asset_id,
            amount,
        } => {
            let mut w = PubDataWriter::new(TxType::Deposit);
            w.u32(*account_index);
            w.u16(*asset_id);
            w.amount(amount)?;
            Ok(w.finish())
        }
        TxContent::DepositNft {
            account_index,
            nft_index,
            content_hash,
            origin_address,
            origin_token_id,
            collection_id,
            creator_royalty_rate,
        } => {
            let mut w = PubDataWriter::new(TxType::DepositNft);
            w.u32(*account_index);
            w.u64(*nft_index);
            w.bytes(content_hash);
            w.bytes(origin_address);
            w.amount(origin_token_id)?;
            w.i64(*collection_id);
            w.i64(*creator_royalty_rate);
            Ok(w.finish())
        }
        TxContent::Transfer {
            from_account_index,
            to_account_index,
            asset_id,
            amount,
            fee_asset_id,
            fee,
        } => {
            let mut w = PubDataWriter::new(TxType::Transfer);
            w.u32(*from_account_index);
            w.u32(*to_account_index);
            w.u16(*asset_id);
            w.amount(amount)?;
            w.u16(*fee_asset_id);
            w.amount(fee)?;
            Ok(w.finish())
        }
        TxContent::Swap {
            account_index,
            pair_index,
            asset_a_id,
            asset_a_amount,
            asset_b_id,
            asset_b_amount,
            fee_asset_id,
            fee,
        } => {
            let mut w = PubDataWriter::new(TxType::Swap);
            w.u32(*account_index);
            w.u16(*pair_index);
            w.u16(*asset_a_id);
            w.amount(asset_a_amount)?;
            w.u16(*asset_b_id);
            w.amount(asset_b_amount)?;
            w.u16(*fee_asset_id);
            w.amount(fee)?;
            Ok(w.finish())
        }
        TxContent::AddLiquidity {
            account_index,
            pair_index,
            asset_a_amount,
            asset_b_amount,
            lp_amount,
            fee_asset_id,
            fee,
        } => {
            let mut w = PubDataWriter::new(TxType::AddLiquidity);
            w.u32(*account_index);
            w.u16(*pair_index);
            w.amount(asset_a_amount)?;
            w.amount(asset_b_amount)?;
            w.amount(lp_amount)?;
            w.u16(*fee_asset_id);
            w.amount(fee)?;
            Ok(w.finish())
        }
        TxContent::RemoveLiquidity {
            account_index,
            pair_index,
            asset_a_amount,
            asset_b_amount,
            lp_amount,
            fee_asset_id,
            fee,
        } => {
            let mut w = PubDataWriter::new(TxType::RemoveLiquidity);
            w.u32(*account_index);
            w.u16(*pair_index);
            w.amount(asset_a_amount)?;
            w.amount(asset_b_amount)?;
            w.amount(lp_amount)?;
            w.u16(*fee_asset_id);
            w.amount(fee)?;
            Ok(w.finish())
        }
        TxContent::Withdraw {
            account_index,
            to_address,
            asset_id,
            amount,
            fee_asset_id,
            fee,
        } => {
            let mut w = PubDataWriter::new(TxType::Withdraw);
            w.u32(*account_index);
            w.bytes(to_address);
            w.u16(*asset_id);
            w.amount(amount)?;
            w.u16(*fee_asset_id);
            w.amount(fee)?;
            Ok(w.finish())
        }
        TxContent::MintNft {
            creator_account_index,
            to_account_index,
            nft_index,
            content_hash,
            collection_id,
            creator_royalty_rate,
            fee_asset_id,
            fee,
        } => {
            let mut w = PubDataWriter::new(TxType::MintNft);
            w.u32(*creator_account_index);
            w.u32(*to_account_index);
            w.u64(*nft_index);
            w.bytes(content_hash);
            w.i64(*collection_id);
            w.i64(*creator_royalty_rate);
            w.u16(*fee_asset_id);
            w.amount(fee)?;
            Ok(w.finish())
        }
        TxContent::WithdrawNft {
            account_index,
            to_address,
            nft_index,
            creator_account_index,
            creator_royalty_rate,
            content_hash,
            fee_asset_id,
            fee,
        } => {
            let mut w = PubDataWriter::new(TxType::WithdrawNft);
            w.u32(*account_index);
            w.bytes(to_address);
            w.u64(*nft_index);
            w.u32(*creator_account_index);
            w.i64(*creator_royalty_rate);
            w.bytes(content_hash);
            w.u16(*fee_asset_id);
            w.amount(fee)?;
            Ok(w.finish())
        }
        TxContent::FullExit {
            account_index,
            asset_id,
            amount,
        } => {
            let mut w = PubDataWriter::new(TxType::FullExit);
            w.u32(*account_index);
            w.u16(*asset_id);
            w.amount(amount)?;
            Ok(w.finish())
        }
        TxContent::FullExitNft {
            account_index,
            creator_account_index,
            nft_index,
            content_hash,
            origin_address,
            origin_token_id,
        } => {
            let mut w = PubDataWriter::new(TxType::FullExitNft);
            w.u32(*account_index);
            w.u32(*creator_account_index);
            w.u64(*nft_index);
            w.bytes(content_hash);
            w.bytes(origin_address);
            w.amount(origin_token_id)?;
            Ok(w.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use rollup_crypto::EMPTY_STRING_KECCAK;

    fn deposit(amount: u64) -> TxContent {
        TxContent::Deposit {
            account_index: 1,
            asset_id: 0,
            amount: BigUint::from(amount),
        }
    }

    fn withdraw(amount: u64) -> TxContent {
        TxContent::Withdraw {
            account_index: 1,
            to_address: [0x11; 20],
            asset_id: 0,
            amount: BigUint::from(amount),
            fee_asset_id: 0,
            fee: BigUint::default(),
        }
    }

    #[test]
    fn records_are_chunk_aligned() {
        for content in [
            deposit(100),
            withdraw(5),
            TxContent::Registration {
                account_index: 0,
                account_name: "alice".into(),
                pub_key: vec![1u8; 32],
            },
        ] {
            let outcome = encode_tx_pub_data(&content, &EMPTY_STRING_KECCAK).unwrap();
            assert_eq!(outcome.pub_data.len() % PUBDATA_CHUNK_BYTES, 0);
            assert!(!outcome.pub_data.is_empty());
        }
    }

    #[test]
    fn priority_operations_are_counted() {
        let outcome = encode_tx_pub_data(&deposit(1), &EMPTY_STRING_KECCAK).unwrap();
        assert_eq!(outcome.priority_op_delta, 1);
        let outcome = encode_tx_pub_data(&withdraw(1), &EMPTY_STRING_KECCAK).unwrap();
        assert_eq!(outcome.priority_op_delta, 0);
    }

    #[test]
    fn withdraw_folds_running_hash_and_deposit_does_not() {
        let deposit_outcome = encode_tx_pub_data(&deposit(1), &EMPTY_STRING_KECCAK).unwrap();
        assert_eq!(deposit_outcome.new_running_hash, EMPTY_STRING_KECCAK);

        let withdraw_outcome = encode_tx_pub_data(&withdraw(1), &EMPTY_STRING_KECCAK).unwrap();
        assert_eq!(
            withdraw_outcome.new_running_hash,
            concat_keccak_hash(&EMPTY_STRING_KECCAK, &withdraw_outcome.pub_data)
        );
    }

    #[test]
    fn chain_order_matters() {
        let full_exit = TxContent::FullExit {
            account_index: 1,
            asset_id: 0,
            amount: BigUint::from(9u32),
        };
        let w_then_f = {
            let first = encode_tx_pub_data(&withdraw(1), &EMPTY_STRING_KECCAK).unwrap();
            encode_tx_pub_data(&full_exit, &first.new_running_hash)
                .unwrap()
                .new_running_hash
        };
        let f_then_w = {
            let first = encode_tx_pub_data(&full_exit, &EMPTY_STRING_KECCAK).unwrap();
            encode_tx_pub_data(&withdraw(1), &first.new_running_hash)
                .unwrap()
                .new_running_hash
        };
        assert_ne!(w_then_f, f_then_w);
    }

    #[test]
    fn unimplemented_kinds_are_explicit_no_ops() {
        let content = TxContent::CancelOffer {
            account_index: 3,
            offer_id: 1,
            fee_asset_id: 0,
            fee: BigUint::default(),
        };
        let outcome = encode_tx_pub_data(&content, &EMPTY_STRING_KECCAK).unwrap();
        assert!(outcome.pub_data.is_empty());
        assert_eq!(outcome.priority_op_delta, 0);
        assert_eq!(outcome.new_running_hash, EMPTY_STRING_KECCAK);
    }

    #[test]
    fn empty_kind_is_an_error() {
        assert!(matches!(
            encode_tx_pub_data(&TxContent::Empty, &EMPTY_STRING_KECCAK),
            Err(PubdataError::EmptyTransaction)
        ));
    }

    #[test]
    fn amounts_survive_the_fixed_field_round_trip() {
        use proptest::prelude::*;
        proptest!(|(value in proptest::collection::vec(any::<u8>(), 1..=32))| {
            let amount = BigUint::from_bytes_be(&value);
            let outcome = encode_tx_pub_data(&deposit_amount(&amount), &EMPTY_STRING_KECCAK).unwrap();
            // Type tag (1) + account index (4) + asset id (2), then 32 bytes.
            let field = &outcome.pub_data[7..39];
            prop_assert_eq!(BigUint::from_bytes_be(field), amount);
        });
    }

    #[test]
    fn hash_chain_is_order_sensitive_for_distinct_records() {
        use proptest::prelude::*;
        proptest!(|(a in 1u64.., b in 1u64..)| {
            prop_assume!(a != b);
            let first = encode_tx_pub_data(&withdraw(a), &EMPTY_STRING_KECCAK).unwrap();
            let second = encode_tx_pub_data(&withdraw(b), &first.new_running_hash).unwrap();
            let first_rev = encode_tx_pub_data(&withdraw(b), &EMPTY_STRING_KECCAK).unwrap();
            let second_rev = encode_tx_pub_data(&withdraw(a), &first_rev.new_running_hash).unwrap();
            prop_assert_ne!(second.new_running_hash, second_rev.new_running_hash);
        });
    }

    fn deposit_amount(amount: &BigUint) -> TxContent {
        TxContent::Deposit {
            account_index: 1,
            asset_id: 0,
            amount: amount.clone(),
        }
    }

    #[test]
    fn oversized_amount_is_rejected() {
        let content = TxContent::Deposit {
            account_index: 0,
            asset_id: 0,
            amount: BigUint::from(1u8) << 300usize,
        };
        assert!(matches!(
            encode_tx_pub_data(&content, &EMPTY_STRING_KECCAK),
            Err(PubdataError::AmountOverflow)
        ));
    }
}
