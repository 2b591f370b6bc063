//! Account records and their per-block history snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rollup_crypto::{Digest, ZERO_DIGEST};

use crate::asset::AssetBalance;

/// An account is Pending from its registration row being created until its
/// registration transaction executes, then Confirmed permanently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Pending,
    Confirmed,
}

/// One user account's authenticated state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_index: u32,
    pub name: String,
    pub pub_key: Vec<u8>,
    pub nonce: i64,
    pub collection_nonce: i64,
    /// Asset id to balance record; absent entries are zero balances.
    pub assets: BTreeMap<u16, AssetBalance>,
    /// Root of this account's private asset sub-tree, folded into the
    /// account's leaf in the top-level account tree.
    pub asset_root: Digest,
    pub status: AccountStatus,
}

impl AccountState {
    pub fn pending(account_index: u32, name: String, pub_key: Vec<u8>) -> Self {
        Self {
            account_index,
            name,
            pub_key,
            nonce: 0,
            collection_nonce: 0,
            assets: BTreeMap::new(),
            asset_root: ZERO_DIGEST,
            status: AccountStatus::Pending,
        }
    }

    /// Balance record for `asset_id`, materializing a zero record on first
    /// reference.
    pub fn asset_or_default(&mut self, asset_id: u16) -> &mut AssetBalance {
        self.assets.entry(asset_id).or_default()
    }
}

/// Immutable snapshot of an account taken at the block that mutated it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountHistory {
    pub account: AccountState,
    pub block_height: i64,
}
