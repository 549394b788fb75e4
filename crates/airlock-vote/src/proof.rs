//! Reveal proofs
//!
//! A reveal carries the raw vote plus a proof with two obligations:
//! the revealed vote opens the earlier commitment, and the revealer holds
//! the secret key of a roster slot. The opening discloses the blinding
//! nonce (the vote it blinded is public at reveal time); key knowledge is
//! a Schnorr proof whose challenge transcript binds the proposal, the
//! commitment, and the vote, so a proof cannot be replayed for a
//! different reveal.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::CompressedRistretto;
use curve25519_dalek::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use airlock_core::types::{hex_bytes_32, Fingerprint, GuardianSlot, VoteChoice};

use crate::commitment::VoteCommitment;
use crate::error::{Result, VoteError};
use crate::keys::{GuardianVotingKey, VotingKeySet};

/// Domain separator for the Schnorr challenge transcript
const CHALLENGE_DOMAIN: &[u8] = b"airlock:reveal-proof:challenge:v1\0";

/// Proof accompanying a revealed vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealProof {
    /// Commitment opening: the blinding nonce
    #[serde(with = "hex_bytes_32")]
    pub nonce: [u8; 32],

    /// Schnorr commitment point
    #[serde(with = "hex_bytes_32")]
    pub big_r: [u8; 32],

    /// Schnorr response
    #[serde(with = "hex_bytes_32")]
    pub z: [u8; 32],
}

impl RevealProof {
    /// Construct the proof for a reveal
    pub fn prove<R: RngCore + CryptoRng>(
        key: &GuardianVotingKey,
        vote: VoteChoice,
        nonce: &Scalar,
        proposal: &Fingerprint,
        rng: &mut R,
    ) -> Self {
        let commitment = VoteCommitment::compute(key.slot, vote, nonce, proposal);

        let r = Scalar::random(rng);
        let big_r = (r * RISTRETTO_BASEPOINT_POINT).compress();
        let public = key.public.compress();
        let c = challenge(proposal, &commitment, vote, &public.to_bytes(), &big_r.to_bytes());
        let z = r + c * key.secret();

        Self {
            nonce: nonce.to_bytes(),
            big_r: big_r.to_bytes(),
            z: z.to_bytes(),
        }
    }

    /// Verify a reveal against the public inputs
    ///
    /// Public inputs: proposal id, the slot's earlier commitment, the
    /// roster key set. Public output: the vote. Returns
    /// `VoteProofInvalid` on any mismatch.
    pub fn verify(
        &self,
        key_set: &VotingKeySet,
        slot: GuardianSlot,
        vote: VoteChoice,
        commitment: &VoteCommitment,
        proposal: &Fingerprint,
    ) -> Result<()> {
        // Commitment opening
        let nonce = scalar_from_canonical(self.nonce)?;
        let reopened = VoteCommitment::compute(slot, vote, &nonce, proposal);
        if reopened != *commitment {
            return Err(VoteError::VoteProofInvalid(slot.index()));
        }

        // Guardian key knowledge: z*B == R + c*K
        let public_point = key_set.point(slot)?;
        let public_bytes = key_set.compressed(slot)?;
        let c = challenge(proposal, commitment, vote, &public_bytes, &self.big_r);

        let big_r = CompressedRistretto::from_slice(&self.big_r)
            .map_err(|e| VoteError::Malformed(e.to_string()))?
            .decompress()
            .ok_or(VoteError::VoteProofInvalid(slot.index()))?;
        let z = scalar_from_canonical(self.z)?;

        if z * RISTRETTO_BASEPOINT_POINT != big_r + c * public_point {
            return Err(VoteError::VoteProofInvalid(slot.index()));
        }
        Ok(())
    }
}

/// Fiat-Shamir challenge over the full reveal transcript
fn challenge(
    proposal: &Fingerprint,
    commitment: &VoteCommitment,
    vote: VoteChoice,
    public_key: &[u8; 32],
    big_r: &[u8; 32],
) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(CHALLENGE_DOMAIN);
    hasher.update(proposal.as_bytes());
    hasher.update(commitment.as_bytes());
    hasher.update([vote.as_u8()]);
    hasher.update(public_key);
    hasher.update(big_r);
    let wide: [u8; 64] = hasher.finalize().into();
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn scalar_from_canonical(bytes: [u8; 32]) -> Result<Scalar> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| VoteError::Malformed("non-canonical scalar".into()))
}
