//! Vote commitments
//!
//! `commitment = Poseidon(slot, vote, nonce, proposal_id)` over the
//! ristretto scalar field. The nonce blinds the vote until reveal; the
//! proposal id binds the commitment to one proposal so it cannot be
//! replayed.

use curve25519_dalek::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use airlock_core::types::{hex_bytes_32, Fingerprint, GuardianSlot, VoteChoice};

use crate::poseidon;

/// A hiding commitment to one guardian's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteCommitment(#[serde(with = "hex_bytes_32")] pub [u8; 32]);

impl VoteCommitment {
    /// Compute the commitment for a (slot, vote, nonce, proposal) tuple
    pub fn compute(
        slot: GuardianSlot,
        vote: VoteChoice,
        nonce: &Scalar,
        proposal: &Fingerprint,
    ) -> Self {
        let inputs = [
            Scalar::from(slot.index() as u64),
            Scalar::from(vote.as_u8() as u64),
            *nonce,
            proposal_scalar(proposal),
        ];
        Self(poseidon::hash_to_bytes(&inputs))
    }

    /// Draw a blinding nonce
    pub fn random_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
        Scalar::random(rng)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Map a proposal fingerprint into the scalar field
pub(crate) fn proposal_scalar(proposal: &Fingerprint) -> Scalar {
    Scalar::from_bytes_mod_order(*proposal.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_commitment_binds_every_field() {
        let nonce = VoteCommitment::random_nonce(&mut OsRng);
        let fp = Fingerprint::new([1u8; 32]);
        let base = VoteCommitment::compute(GuardianSlot(0), VoteChoice::Approve, &nonce, &fp);

        assert_ne!(
            base,
            VoteCommitment::compute(GuardianSlot(1), VoteChoice::Approve, &nonce, &fp)
        );
        assert_ne!(
            base,
            VoteCommitment::compute(GuardianSlot(0), VoteChoice::Reject, &nonce, &fp)
        );
        assert_ne!(
            base,
            VoteCommitment::compute(
                GuardianSlot(0),
                VoteChoice::Approve,
                &VoteCommitment::random_nonce(&mut OsRng),
                &fp
            )
        );
        assert_ne!(
            base,
            VoteCommitment::compute(
                GuardianSlot(0),
                VoteChoice::Approve,
                &nonce,
                &Fingerprint::new([2u8; 32])
            )
        );
    }

    #[test]
    fn test_commitment_hides_vote_without_nonce() {
        // Identical inputs always recommit identically; the hiding property
        // rests entirely on the nonce
        let nonce = VoteCommitment::random_nonce(&mut OsRng);
        let fp = Fingerprint::new([9u8; 32]);
        let a = VoteCommitment::compute(GuardianSlot(3), VoteChoice::Abstain, &nonce, &fp);
        let b = VoteCommitment::compute(GuardianSlot(3), VoteChoice::Abstain, &nonce, &fp);
        assert_eq!(a, b);
    }
}
