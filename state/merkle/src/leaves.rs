//! Leaf hash layouts for the four tree kinds, plus the global state root.
//!
//! Every field a leaf commits to is packed into sponge elements in a fixed
//! order under a per-kind domain tag. Changing any field, including the
//! folded asset sub-tree root inside an account leaf, changes the leaf hash.

use num_bigint::BigUint;

use rollup_crypto::{bytes_to_elements, digest_to_elements, hash_elements, Digest, Felt};

const ACCOUNT_LEAF_DOMAIN_TAG: u64 = 11;
const ASSET_LEAF_DOMAIN_TAG: u64 = 12;
const LIQUIDITY_LEAF_DOMAIN_TAG: u64 = 13;
const NFT_LEAF_DOMAIN_TAG: u64 = 14;
const STATE_ROOT_DOMAIN_TAG: u64 = 15;

fn push_uint(inputs: &mut Vec<Felt>, value: &BigUint) {
    inputs.push(Felt::new(value.bits()));
    inputs.extend(bytes_to_elements(&value.to_bytes_be()));
}

// Variable-length fields are length-prefixed so adjacent fields cannot be
// re-split into a colliding pair.
fn push_bytes(inputs: &mut Vec<Felt>, bytes: &[u8]) {
    inputs.push(Felt::new(bytes.len() as u64));
    inputs.extend(bytes_to_elements(bytes));
}

/// Account leaf: the top-level tree is a two-level commitment, so the
/// account's asset sub-tree root is itself a committed field here.
pub fn account_leaf_hash(
    name: &str,
    pub_key: &[u8],
    nonce: i64,
    collection_nonce: i64,
    asset_root: &Digest,
) -> Digest {
    let mut inputs = Vec::new();
    push_bytes(&mut inputs, name.as_bytes());
    push_bytes(&mut inputs, pub_key);
    inputs.push(Felt::new(nonce as u64));
    inputs.push(Felt::new(collection_nonce as u64));
    inputs.extend(digest_to_elements(asset_root));
    hash_elements(ACCOUNT_LEAF_DOMAIN_TAG, &inputs)
}

pub fn asset_leaf_hash(
    balance: &BigUint,
    lp_amount: &BigUint,
    offer_canceled_or_finalized: &BigUint,
) -> Digest {
    let mut inputs = Vec::new();
    push_uint(&mut inputs, balance);
    push_uint(&mut inputs, lp_amount);
    push_uint(&mut inputs, offer_canceled_or_finalized);
    hash_elements(ASSET_LEAF_DOMAIN_TAG, &inputs)
}

#[allow(clippy::too_many_arguments)]
pub fn liquidity_leaf_hash(
    asset_a_id: u16,
    asset_a: &BigUint,
    asset_b_id: u16,
    asset_b: &BigUint,
    lp_supply: &BigUint,
    k_last: &BigUint,
    fee_rate: i64,
    treasury_account_index: u32,
    treasury_rate: i64,
) -> Digest {
    let mut inputs = vec![Felt::new(asset_a_id as u64)];
    push_uint(&mut inputs, asset_a);
    inputs.push(Felt::new(asset_b_id as u64));
    push_uint(&mut inputs, asset_b);
    push_uint(&mut inputs, lp_supply);
    push_uint(&mut inputs, k_last);
    inputs.push(Felt::new(fee_rate as u64));
    inputs.push(Felt::new(treasury_account_index as u64));
    inputs.push(Felt::new(treasury_rate as u64));
    hash_elements(LIQUIDITY_LEAF_DOMAIN_TAG, &inputs)
}

pub fn nft_leaf_hash(
    creator_account_index: u32,
    owner_account_index: u32,
    content_hash: &Digest,
    origin_address: &[u8; 20],
    origin_token_id: &BigUint,
    creator_royalty_rate: i64,
    collection_id: i64,
) -> Digest {
    let mut inputs = vec![
        Felt::new(creator_account_index as u64),
        Felt::new(owner_account_index as u64),
    ];
    inputs.extend(digest_to_elements(content_hash));
    inputs.extend(bytes_to_elements(origin_address));
    push_uint(&mut inputs, origin_token_id);
    inputs.push(Felt::new(creator_royalty_rate as u64));
    inputs.push(Felt::new(collection_id as u64));
    hash_elements(NFT_LEAF_DOMAIN_TAG, &inputs)
}

/// The global root committed into every block.
pub fn state_root(account_root: &Digest, liquidity_root: &Digest, nft_root: &Digest) -> Digest {
    let mut inputs = Vec::with_capacity(12);
    inputs.extend(digest_to_elements(account_root));
    inputs.extend(digest_to_elements(liquidity_root));
    inputs.extend(digest_to_elements(nft_root));
    hash_elements(STATE_ROOT_DOMAIN_TAG, &inputs)
}
