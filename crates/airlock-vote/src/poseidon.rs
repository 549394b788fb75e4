//! Poseidon-style sponge over the ristretto255 scalar field
//!
//! Width 3 (rate 2, capacity 1), x^5 S-box, 8 full + 56 partial rounds.
//! Round constants and the MDS matrix are derived deterministically from a
//! SHA-512 counter stream, so every node computes identical digests. The
//! same permutation is native to an arithmetic circuit over this field,
//! which is what qualifies it as the commitment hash.

use std::sync::OnceLock;

use curve25519_dalek::Scalar;
use sha2::{Digest, Sha512};

/// State width in field elements
pub const WIDTH: usize = 3;

/// Absorption rate in field elements
pub const RATE: usize = 2;

/// Full rounds (split evenly before and after the partial rounds)
pub const ROUNDS_FULL: usize = 8;

/// Partial rounds
pub const ROUNDS_PARTIAL: usize = 56;

const CONSTANTS_DOMAIN: &[u8] = b"airlock:poseidon:round-constants:v1\0";

/// Derived permutation parameters
pub struct PoseidonParams {
    round_constants: Vec<[Scalar; WIDTH]>,
    mds: [[Scalar; WIDTH]; WIDTH],
}

impl PoseidonParams {
    fn new() -> Self {
        let total_rounds = ROUNDS_FULL + ROUNDS_PARTIAL;
        let mut round_constants = Vec::with_capacity(total_rounds);
        for round in 0..total_rounds {
            let mut row = [Scalar::ZERO; WIDTH];
            for (lane, slot) in row.iter_mut().enumerate() {
                *slot = derive_scalar(CONSTANTS_DOMAIN, round as u64, lane as u64);
            }
            round_constants.push(row);
        }

        // Cauchy matrix m[i][j] = 1 / (x_i + y_j) over disjoint sequences,
        // invertible over a prime field
        let mut mds = [[Scalar::ZERO; WIDTH]; WIDTH];
        for (i, row) in mds.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let x = Scalar::from((i + 1) as u64);
                let y = Scalar::from((j + 1 + WIDTH) as u64);
                *cell = (x + y).invert();
            }
        }

        Self {
            round_constants,
            mds,
        }
    }

    /// Process-wide parameters
    pub fn global() -> &'static Self {
        static PARAMS: OnceLock<PoseidonParams> = OnceLock::new();
        PARAMS.get_or_init(Self::new)
    }

    /// The permutation
    pub fn permute(&self, state: &mut [Scalar; WIDTH]) {
        let half_full = ROUNDS_FULL / 2;
        let mut round = 0;

        for _ in 0..half_full {
            self.full_round(state, round);
            round += 1;
        }
        for _ in 0..ROUNDS_PARTIAL {
            self.partial_round(state, round);
            round += 1;
        }
        for _ in 0..half_full {
            self.full_round(state, round);
            round += 1;
        }
    }

    fn full_round(&self, state: &mut [Scalar; WIDTH], round: usize) {
        let constants = &self.round_constants[round];
        for (lane, slot) in state.iter_mut().enumerate() {
            *slot += constants[lane];
            *slot = sbox(*slot);
        }
        self.apply_mds(state);
    }

    fn partial_round(&self, state: &mut [Scalar; WIDTH], round: usize) {
        let constants = &self.round_constants[round];
        for (lane, slot) in state.iter_mut().enumerate() {
            *slot += constants[lane];
        }
        state[0] = sbox(state[0]);
        self.apply_mds(state);
    }

    fn apply_mds(&self, state: &mut [Scalar; WIDTH]) {
        let mut next = [Scalar::ZERO; WIDTH];
        for (i, row) in self.mds.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                next[i] += cell * state[j];
            }
        }
        *state = next;
    }
}

/// x^5 S-box
fn sbox(x: Scalar) -> Scalar {
    let x2 = x * x;
    let x4 = x2 * x2;
    x4 * x
}

/// Derive a field element from the parameter stream
fn derive_scalar(domain: &[u8], index: u64, lane: u64) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(domain);
    hasher.update(index.to_le_bytes());
    hasher.update(lane.to_le_bytes());
    let wide: [u8; 64] = hasher.finalize().into();
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Sponge hash of a sequence of field elements
pub fn hash(inputs: &[Scalar]) -> Scalar {
    let params = PoseidonParams::global();
    let mut state = [Scalar::ZERO; WIDTH];
    // Domain-separate by input length in the capacity lane
    state[WIDTH - 1] = Scalar::from(inputs.len() as u64);

    for chunk in inputs.chunks(RATE) {
        for (lane, value) in chunk.iter().enumerate() {
            state[lane] += value;
        }
        params.permute(&mut state);
    }
    if inputs.is_empty() {
        params.permute(&mut state);
    }
    state[0]
}

/// Hash to 32 canonical scalar bytes
pub fn hash_to_bytes(inputs: &[Scalar]) -> [u8; 32] {
    hash(inputs).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let inputs = [Scalar::from(1u64), Scalar::from(2u64), Scalar::from(3u64)];
        assert_eq!(hash(&inputs), hash(&inputs));
    }

    #[test]
    fn test_hash_input_sensitivity() {
        let a = hash(&[Scalar::from(1u64), Scalar::from(2u64)]);
        let b = hash(&[Scalar::from(2u64), Scalar::from(1u64)]);
        let c = hash(&[Scalar::from(1u64), Scalar::from(2u64), Scalar::ZERO]);
        assert_ne!(a, b);
        // Length is domain-separated, so zero-padding changes the digest
        assert_ne!(a, c);
    }

    #[test]
    fn test_permutation_not_identity() {
        let params = PoseidonParams::global();
        let mut state = [Scalar::from(7u64), Scalar::from(8u64), Scalar::from(9u64)];
        let before = state;
        params.permute(&mut state);
        assert_ne!(state, before);
    }

    #[test]
    fn test_empty_input_defined() {
        // Zero-length input still produces a stable digest
        assert_eq!(hash(&[]), hash(&[]));
        assert_ne!(hash(&[]), hash(&[Scalar::ZERO]));
    }
}
