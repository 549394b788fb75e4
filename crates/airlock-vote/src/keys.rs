//! Guardian voting keypairs
//!
//! Separate from the FROST signing shares: these keys authenticate reveal
//! proofs. Each slot holds a scalar secret; the ordered set of public
//! points is a public input to reveal verification.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use airlock_core::types::GuardianSlot;

use crate::error::{Result, VoteError};

/// A slot's voting keypair
#[derive(Clone)]
pub struct GuardianVotingKey {
    /// Slot this key belongs to
    pub slot: GuardianSlot,

    /// Secret scalar; never leaves the guardian
    secret: Scalar,

    /// Public point `secret * B`
    pub public: RistrettoPoint,
}

impl std::fmt::Debug for GuardianVotingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardianVotingKey")
            .field("slot", &self.slot)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl Drop for GuardianVotingKey {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl GuardianVotingKey {
    /// Generate a fresh keypair for a slot
    pub fn generate<R: RngCore + CryptoRng>(slot: GuardianSlot, rng: &mut R) -> Self {
        let secret = Scalar::random(rng);
        let public = secret * RISTRETTO_BASEPOINT_POINT;
        Self {
            slot,
            secret,
            public,
        }
    }

    /// The secret scalar, for proof construction only
    pub(crate) fn secret(&self) -> &Scalar {
        &self.secret
    }
}

/// The ordered public key set of the guardian roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingKeySet {
    /// Compressed public points, indexed by slot
    keys: Vec<[u8; 32]>,
}

impl VotingKeySet {
    /// Build from the generated keypairs, ordered by slot
    pub fn from_keys(keys: &[GuardianVotingKey]) -> Self {
        let mut ordered: Vec<_> = keys.iter().collect();
        ordered.sort_by_key(|k| k.slot.index());
        Self {
            keys: ordered.iter().map(|k| k.public.compress().to_bytes()).collect(),
        }
    }

    /// Number of slots in the set
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Decompress the public point of a slot
    pub fn point(&self, slot: GuardianSlot) -> Result<RistrettoPoint> {
        let bytes = self
            .keys
            .get(slot.index() as usize)
            .ok_or_else(|| VoteError::Malformed(format!("no key for slot {}", slot.index())))?;
        CompressedRistretto::from_slice(bytes)
            .map_err(|e| VoteError::Malformed(e.to_string()))?
            .decompress()
            .ok_or_else(|| VoteError::Malformed("non-canonical public key point".into()))
    }

    /// Raw compressed bytes of a slot's key, for transcript hashing
    pub fn compressed(&self, slot: GuardianSlot) -> Result<[u8; 32]> {
        self.keys
            .get(slot.index() as usize)
            .copied()
            .ok_or_else(|| VoteError::Malformed(format!("no key for slot {}", slot.index())))
    }
}
