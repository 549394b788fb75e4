//! Wesolowski proofs over an RSA group
//!
//! Proving: `y = x^{2^T} mod N` by `T` sequential squarings, witness
//! `pi = x^{floor(2^T / l)}` where `l` is a Fiat-Shamir prime derived from
//! `(x, y)`. Verification: `pi^l * x^r == y (mod N)` with `r = 2^T mod l`.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use airlock_core::envelope::VdfProofBytes;

use crate::error::VdfError;
use crate::{FS_PRIME_BITS, MILLER_RABIN_ROUNDS};

/// Domain separator for mapping a challenge into the RSA group
const CHALLENGE_DOMAIN: &[u8] = b"airlock:vdf:challenge:v1\0";

/// Domain separator for Fiat-Shamir prime derivation
const PRIME_DOMAIN: &[u8] = b"airlock:vdf:prime:v1\0";

/// Domain separator for the wire digest of the VDF output
const OUTPUT_DOMAIN: &[u8] = b"airlock:vdf:output:v1\0";

/// Small primes used for trial division before Miller-Rabin
const SMALL_PRIMES: [u32; 54] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

/// The fixed RSA modulus the VDF runs over
///
/// Soundness rests on the group order staying unknown: anyone who learns
/// the factorization can reduce the exponent mod phi(N) and skip the
/// sequential squarings entirely. The modulus therefore comes from a
/// setup ceremony whose prime factors are discarded, never from any
/// value the public could rederive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaModulus(BigUint);

impl RsaModulus {
    /// Run the local setup ceremony for a modulus of `bits`
    ///
    /// Draws two probable primes of `bits / 2` from the CSPRNG and
    /// multiplies them. The factors go out of scope here and are never
    /// returned or persisted; callers persist only the modulus bytes.
    /// A multi-party deployment replaces this with an MPC ceremony and
    /// distributes the resulting modulus through its trusted channel.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, bits: u64) -> Self {
        let p = random_prime(rng, bits / 2);
        let q = random_prime(rng, bits / 2);
        Self(p * q)
    }

    /// Construct from raw big-endian bytes
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// The modulus as big-endian bytes, for persistence
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    /// The modulus value
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Map a challenge into the group
    ///
    /// SHA-256 counter-mode expansion to modulus width plus a safety margin,
    /// reduced mod N. The result is forced above 1 so squaring is never
    /// trivially fixed.
    pub fn group_element(&self, challenge: &[u8]) -> BigUint {
        let width = (self.0.bits() as usize).div_ceil(8) + 16;
        let mut stream = Vec::with_capacity(width + 32);
        let mut counter: u32 = 0;
        while stream.len() < width {
            let mut hasher = Sha256::new();
            hasher.update(CHALLENGE_DOMAIN);
            hasher.update((challenge.len() as u64).to_le_bytes());
            hasher.update(challenge);
            hasher.update(counter.to_le_bytes());
            stream.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        stream.truncate(width);
        let x = BigUint::from_bytes_be(&stream) % &self.0;
        if x < BigUint::from(2u32) {
            x + BigUint::from(2u32)
        } else {
            x
        }
    }
}

/// A complete Wesolowski proof in group form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdfProof {
    /// VDF output `y = x^{2^T} mod N`
    pub output: BigUint,

    /// Witness `pi = x^{floor(2^T / l)} mod N`
    pub witness: BigUint,

    /// Iterations performed
    pub iterations: u64,
}

impl VdfProof {
    /// Encode into the wire form carried by an envelope
    ///
    /// The 32-byte output slot holds a digest of `y`; the witness slot
    /// carries length-prefixed big-endian `pi` and `y`.
    pub fn to_wire(&self) -> VdfProofBytes {
        let y_bytes = self.output.to_bytes_be();
        let pi_bytes = self.witness.to_bytes_be();

        let mut witness = Vec::with_capacity(8 + y_bytes.len() + pi_bytes.len());
        witness.extend_from_slice(&(pi_bytes.len() as u32).to_le_bytes());
        witness.extend_from_slice(&pi_bytes);
        witness.extend_from_slice(&(y_bytes.len() as u32).to_le_bytes());
        witness.extend_from_slice(&y_bytes);

        VdfProofBytes {
            output: output_digest(&self.output),
            witness,
            iterations: self.iterations,
        }
    }

    /// Decode from wire form, checking the output digest
    pub fn from_wire(wire: &VdfProofBytes) -> Result<Self, VdfError> {
        let (pi_bytes, rest) = split_prefixed(&wire.witness)
            .ok_or_else(|| VdfError::MalformedProof("truncated witness field".into()))?;
        let (y_bytes, rest) = split_prefixed(rest)
            .ok_or_else(|| VdfError::MalformedProof("truncated output field".into()))?;
        if !rest.is_empty() {
            return Err(VdfError::MalformedProof("trailing witness bytes".into()));
        }

        let output = BigUint::from_bytes_be(y_bytes);
        if output_digest(&output) != wire.output {
            return Err(VdfError::MalformedProof("output digest mismatch".into()));
        }

        Ok(Self {
            output,
            witness: BigUint::from_bytes_be(pi_bytes),
            iterations: wire.iterations,
        })
    }
}

/// Digest of the VDF output for the fixed-width wire slot
fn output_digest(y: &BigUint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(OUTPUT_DOMAIN);
    hasher.update(y.to_bytes_be());
    hasher.finalize().into()
}

fn split_prefixed(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    if bytes.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes(bytes[..4].try_into().ok()?) as usize;
    let rest = &bytes[4..];
    if rest.len() < len {
        return None;
    }
    Some((&rest[..len], &rest[len..]))
}

/// Evaluate `x^{2^T} mod N` by sequential squaring
///
/// `observer` is invoked every `checkpoint_every` iterations with the count
/// of completed squarings; returning `false` abandons the computation.
/// The loop must not be parallelized: the delay property rests on `T`
/// sequential squarings.
pub fn evaluate(
    x: &BigUint,
    iterations: u64,
    modulus: &RsaModulus,
    checkpoint_every: u64,
    observer: &mut dyn FnMut(u64) -> bool,
) -> Option<BigUint> {
    let n = modulus.value();
    let mut y = x.clone();
    let mut done: u64 = 0;
    while done < iterations {
        let burst = checkpoint_every.min(iterations - done);
        for _ in 0..burst {
            y = &y * &y % n;
        }
        done += burst;
        if !observer(done) {
            return None;
        }
    }
    Some(y)
}

/// Compute the Wesolowski witness `pi = x^{floor(2^T / l)} mod N`
///
/// Long-division form: after `k` steps `pi = x^{floor(2^k / l)}` and
/// `r = 2^k mod l`, so the quotient exponent is never materialized.
/// Subject to the same checkpoint observer as [`evaluate`].
pub fn compute_witness(
    x: &BigUint,
    iterations: u64,
    l: &BigUint,
    modulus: &RsaModulus,
    checkpoint_every: u64,
    observer: &mut dyn FnMut(u64) -> bool,
) -> Option<BigUint> {
    let n = modulus.value();
    let one = BigUint::one();
    let mut pi = BigUint::one();
    let mut r = BigUint::one();
    let mut done: u64 = 0;
    while done < iterations {
        let burst = checkpoint_every.min(iterations - done);
        for _ in 0..burst {
            let doubled = &r << 1u32;
            let carry = &doubled / l;
            r = doubled % l;
            pi = &pi * &pi % n;
            if carry == one {
                pi = &pi * x % n;
            }
        }
        done += burst;
        if !observer(done) {
            return None;
        }
    }
    Some(pi)
}

/// Derive the Fiat-Shamir prime `l` from `(x, y)`
pub fn hash_to_prime(x: &BigUint, y: &BigUint) -> BigUint {
    let x_bytes = x.to_bytes_be();
    let y_bytes = y.to_bytes_be();
    let mut counter: u64 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(PRIME_DOMAIN);
        hasher.update((x_bytes.len() as u64).to_le_bytes());
        hasher.update(&x_bytes);
        hasher.update((y_bytes.len() as u64).to_le_bytes());
        hasher.update(&y_bytes);
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();

        let mut candidate = BigUint::from_bytes_be(&digest[..(FS_PRIME_BITS / 8) as usize]);
        candidate.set_bit(FS_PRIME_BITS - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, MILLER_RABIN_ROUNDS) {
            return candidate;
        }
        counter += 1;
    }
}

/// Stateless proof verification
///
/// Recomputes `x` from the challenge, re-derives `l`, and checks
/// `pi^l * x^r == y (mod N)`. The zero-proof never passes here; its
/// acceptance is the envelope validator's job, conditioned on a valid
/// threshold signature.
pub fn verify(challenge: &[u8], iterations: u64, proof: &VdfProof, modulus: &RsaModulus) -> bool {
    if proof.iterations != iterations || iterations == 0 {
        return false;
    }
    let n = modulus.value();
    if proof.output.is_zero() || proof.witness.is_zero() {
        return false;
    }
    if &proof.output >= n || &proof.witness >= n {
        return false;
    }

    let x = modulus.group_element(challenge);
    let l = hash_to_prime(&x, &proof.output);
    let r = BigUint::from(2u32).modpow(&BigUint::from(iterations), &l);
    let lhs = proof.witness.modpow(&l, n) * x.modpow(&r, n) % n;
    lhs == proof.output
}

/// Miller-Rabin with deterministic bases derived from the candidate
pub fn is_probable_prime(n: &BigUint, rounds: u32) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - BigUint::one();
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;
    let n_bytes = n.to_bytes_be();

    'witness: for round in 0..rounds {
        let mut hasher = Sha256::new();
        hasher.update(b"airlock:vdf:mr-base:v1\0");
        hasher.update(&n_bytes);
        hasher.update(round.to_le_bytes());
        let base_seed = BigUint::from_bytes_be(&hasher.finalize());
        // Base in [2, n-2]
        let a = base_seed % (n - BigUint::from(4u32)) + &two;

        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Draw a probable prime of `bits` from the CSPRNG
fn random_prime<R: RngCore + CryptoRng>(rng: &mut R, bits: u64) -> BigUint {
    loop {
        let mut candidate = rng.gen_biguint(bits);
        // Full width and odd; top two bits set so the product of two such
        // primes fills the target modulus width.
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(bits - 2, true);
        candidate.set_bit(0, true);

        if is_probable_prime(&candidate, MILLER_RABIN_ROUNDS) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    /// Small modulus keeps test proving fast; the math is width-agnostic
    fn test_modulus() -> RsaModulus {
        RsaModulus::generate(&mut OsRng, 256)
    }

    fn run_proof(challenge: &[u8], iterations: u64, modulus: &RsaModulus) -> VdfProof {
        let x = modulus.group_element(challenge);
        let mut observer = |_done: u64| true;
        let y = evaluate(&x, iterations, modulus, 64, &mut observer).unwrap();
        let l = hash_to_prime(&x, &y);
        let pi = compute_witness(&x, iterations, &l, modulus, 64, &mut observer).unwrap();
        VdfProof {
            output: y,
            witness: pi,
            iterations,
        }
    }

    #[test]
    fn test_prove_verify_roundtrip() {
        let modulus = test_modulus();
        let proof = run_proof(b"challenge-a", 1000, &modulus);
        assert!(verify(b"challenge-a", 1000, &proof, &modulus));
    }

    #[test]
    fn test_verify_rejects_wrong_challenge() {
        let modulus = test_modulus();
        let proof = run_proof(b"challenge-a", 1000, &modulus);
        assert!(!verify(b"challenge-b", 1000, &proof, &modulus));
    }

    #[test]
    fn test_verify_rejects_wrong_iterations() {
        let modulus = test_modulus();
        let proof = run_proof(b"challenge-a", 1000, &modulus);
        assert!(!verify(b"challenge-a", 999, &proof, &modulus));
    }

    #[test]
    fn test_verify_rejects_forged_output() {
        let modulus = test_modulus();
        let mut proof = run_proof(b"challenge-a", 1000, &modulus);
        proof.output += BigUint::one();
        assert!(!verify(b"challenge-a", 1000, &proof, &modulus));
    }

    #[test]
    fn test_evaluate_abandons_on_observer_false() {
        let modulus = test_modulus();
        let x = modulus.group_element(b"challenge");
        let mut calls = 0u32;
        let mut observer = |_done: u64| {
            calls += 1;
            calls < 3
        };
        let result = evaluate(&x, 10_000, &modulus, 64, &mut observer);
        assert!(result.is_none());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_wire_roundtrip() {
        let modulus = test_modulus();
        let proof = run_proof(b"wire", 500, &modulus);
        let wire = proof.to_wire();
        let back = VdfProof::from_wire(&wire).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn test_wire_rejects_tampered_digest() {
        let modulus = test_modulus();
        let mut wire = run_proof(b"wire", 500, &modulus).to_wire();
        wire.output[0] ^= 0x01;
        assert!(VdfProof::from_wire(&wire).is_err());
    }

    #[test]
    fn test_hash_to_prime_is_prime_and_deterministic() {
        let x = BigUint::from(123456789u64);
        let y = BigUint::from(987654321u64);
        let l1 = hash_to_prime(&x, &y);
        let l2 = hash_to_prime(&x, &y);
        assert_eq!(l1, l2);
        assert!(is_probable_prime(&l1, 32));
        assert_eq!(l1.bits(), FS_PRIME_BITS);
    }

    #[test]
    fn test_miller_rabin_known_values() {
        for p in [2u32, 3, 5, 104729, 1_000_003] {
            assert!(is_probable_prime(&BigUint::from(p), 32), "{p} is prime");
        }
        for c in [1u32, 4, 100, 104730, 1_000_001] {
            assert!(!is_probable_prime(&BigUint::from(c), 32), "{c} is composite");
        }
    }

    #[test]
    fn test_ceremony_moduli_are_unique_and_full_width() {
        let a = RsaModulus::generate(&mut OsRng, 128);
        let b = RsaModulus::generate(&mut OsRng, 128);
        // Two ceremonies never agree; a rederivable modulus would leak
        // its own factorization
        assert_ne!(a, b);
        assert_eq!(a.value().bits(), 128);
        assert_eq!(b.value().bits(), 128);
    }

    #[test]
    fn test_modulus_bytes_roundtrip() {
        let modulus = RsaModulus::generate(&mut OsRng, 128);
        let restored = RsaModulus::from_bytes_be(&modulus.to_bytes_be());
        assert_eq!(modulus, restored);
    }

    #[test]
    fn test_group_element_above_one() {
        let modulus = test_modulus();
        let x = modulus.group_element(b"");
        assert!(x >= BigUint::from(2u32));
        assert!(&x < modulus.value());
    }
}
