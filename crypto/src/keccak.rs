//! Settlement-layer hash conventions: the Keccak-256 chain over pending
//! on-chain operation pubdata, and the SHA-256 block commitment.

use sha2::{Digest as _, Sha256};
use sha3::Keccak256;

use crate::Digest;

/// `keccak256("")`, the seed of every pending on-chain operations chain.
pub const EMPTY_STRING_KECCAK: Digest = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
];

pub fn keccak256(bytes: &[u8]) -> Digest {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Fold one pubdata record into the running on-chain operations hash.
///
/// This is an accumulator, not a tree: verification replays the same chain
/// in the same order, so the operation is deliberately order-sensitive.
pub fn concat_keccak_hash(old: &Digest, pub_data: &[u8]) -> Digest {
    let mut buffer = Vec::with_capacity(32 + pub_data.len());
    buffer.extend_from_slice(old);
    buffer.extend_from_slice(pub_data);
    keccak256(&buffer)
}

/// Commitment binding a block to its predecessor, creation time, and the
/// exact public data the settlement layer will receive.
pub fn block_commitment(
    prev_height: i64,
    new_height: i64,
    created_at_ms: i64,
    pub_data: &[u8],
) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(prev_height.to_be_bytes());
    hasher.update(new_height.to_be_bytes());
    hasher.update(created_at_ms.to_be_bytes());
    hasher.update(pub_data);
    hasher.finalize().into()
}
