//! Hash primitives for the rollup state-transition core.
//!
//! Two hash domains live here. The circuit-friendly sponge ([`sponge`])
//! hashes tree leaves and nodes so the prover can verify them cheaply
//! in-circuit. The settlement-facing hashes ([`keccak`]) mirror the
//! conventions of the settlement contract: Keccak-256 for the pending
//! on-chain operations chain and SHA-256 for the block commitment.

pub mod felt;
pub mod keccak;
pub mod sponge;

pub use felt::Felt;
pub use keccak::{
    block_commitment, concat_keccak_hash, keccak256, EMPTY_STRING_KECCAK,
};
pub use sponge::{bytes_to_elements, digest_to_elements, hash_elements, merkle_node};

/// 32-byte digest used for every tree node, root, and commitment.
pub type Digest = [u8; 32];

/// The all-zero digest, used as the canonical empty leaf.
pub const ZERO_DIGEST: Digest = [0u8; 32];
