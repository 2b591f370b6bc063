//! Witness assembly for the proving subsystem.
//!
//! For every executed transaction the builder reads the four state trees at
//! that transaction's execution point and packages the transaction's typed
//! fields together with fixed-depth Merkle proofs for each referenced leaf.
//! The proof arrays are fixed-size by construction; a sibling array whose
//! length differs from the tree's declared depth is a structural error,
//! never padded or truncated.

pub mod builder;
pub mod types;

pub use builder::WitnessHelper;
pub use types::{
    to_fixed_proof, AccountProof, AccountWitness, AssetLeafWitness, AssetProof, FixedProof,
    LiquidityProof, LiquidityWitness, NftProof, NftWitness, TxWitness, WitnessError,
};
