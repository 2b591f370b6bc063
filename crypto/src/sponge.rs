//! Domain-tagged Poseidon-style sponge over the Goldilocks field.
//!
//! Width 3, rate 2, x^5 round function with deterministic round constants.
//! Callers pick a domain tag per leaf kind so distinct structures can never
//! collide across domains.

use crate::felt::Felt;
use crate::Digest;

const WIDTH: usize = 3;
const RATE: usize = WIDTH - 1;
const ROUNDS: usize = 64;

/// Domain tag for interior Merkle nodes.
const MERKLE_DOMAIN_TAG: u64 = 3;

fn round_constant(round: usize, position: usize) -> Felt {
    // Deterministic but simple constant generation derived from round/position indices.
    let seed = ((round as u64 + 1).wrapping_mul(0x9e37_79b9)) ^ ((position as u64 + 1).wrapping_mul(0x7f4a_7c15));
    Felt::new(seed)
}

fn mix(state: &mut [Felt; WIDTH]) {
    const MIX: [[u64; WIDTH]; WIDTH] = [[2, 1, 1], [1, 2, 1], [1, 1, 2]];
    let snapshot = *state;
    let mut tmp = [Felt::ZERO; WIDTH];
    for (row, output) in MIX.iter().zip(tmp.iter_mut()) {
        *output = row
            .iter()
            .zip(snapshot.iter())
            .fold(Felt::ZERO, |acc, (&coef, value)| acc + *value * Felt::new(coef));
    }
    *state = tmp;
}

fn permutation(state: &mut [Felt; WIDTH]) {
    for round in 0..ROUNDS {
        for (position, value) in state.iter_mut().enumerate() {
            *value += round_constant(round, position);
        }
        state.iter_mut().for_each(|value| *value = value.exp5());
        mix(state);
    }
}

fn absorb(state: &mut [Felt; WIDTH], chunk: &[Felt; RATE]) {
    for (slot, value) in state.iter_mut().zip(chunk.iter()) {
        *slot += *value;
    }
    permutation(state);
}

/// Hash a sequence of field elements under a domain tag into a 32-byte digest.
///
/// The digest is formed by squeezing four field elements, permuting the state
/// between extractions, and concatenating their big-endian encodings.
pub fn hash_elements(domain_tag: u64, inputs: &[Felt]) -> Digest {
    let mut state = [Felt::new(domain_tag), Felt::ZERO, Felt::ONE];
    let mut cursor = 0;
    while cursor < inputs.len() {
        let take = core::cmp::min(RATE, inputs.len() - cursor);
        let mut chunk = [Felt::ZERO; RATE];
        chunk[..take].copy_from_slice(&inputs[cursor..cursor + take]);
        absorb(&mut state, &chunk);
        cursor += take;
    }
    if inputs.is_empty() {
        permutation(&mut state);
    }

    let mut out = [0u8; 32];
    for limb in 0..4 {
        out[limb * 8..(limb + 1) * 8].copy_from_slice(&state[0].as_int().to_be_bytes());
        permutation(&mut state);
    }
    out
}

/// Hash two child digests into their parent node.
pub fn merkle_node(left: &Digest, right: &Digest) -> Digest {
    let mut inputs = [Felt::ZERO; 8];
    inputs[..4].copy_from_slice(&digest_to_elements(left));
    inputs[4..].copy_from_slice(&digest_to_elements(right));
    hash_elements(MERKLE_DOMAIN_TAG, &inputs)
}

/// Split a digest into its four big-endian field-element limbs.
pub fn digest_to_elements(digest: &Digest) -> [Felt; 4] {
    let mut limbs = [Felt::ZERO; 4];
    for (limb, chunk) in limbs.iter_mut().zip(digest.chunks(8)) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        *limb = Felt::new(u64::from_be_bytes(buf));
    }
    limbs
}

/// Pack arbitrary bytes into field elements, eight bytes per element,
/// left-padding the trailing chunk.
pub fn bytes_to_elements(bytes: &[u8]) -> Vec<Felt> {
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[8 - chunk.len()..].copy_from_slice(chunk);
            Felt::new(u64::from_be_bytes(buf))
        })
        .collect()
}
