//! Two-round threshold signing and verification
//!
//! Round 1: each participating slot samples its nonce pair and publishes
//! commitments. Round 2: each slot signs against the full commitment set
//! (the binding factor ties its share to the message and participant set),
//! and the shares aggregate into one Schnorr signature.

use std::collections::{BTreeMap, BTreeSet};

use frost_ristretto255 as frost;
use rand::rngs::OsRng;
use tracing::debug;

use airlock_core::envelope::ThresholdSignature;
use airlock_core::types::GuardianSlot;

use crate::dkg::{slot_identifier, GuardianKeyring};
use crate::error::{Result, ThresholdError};
use crate::GroupVerifyingKey;

/// Produce a threshold signature over `message` from the given slots
///
/// Fails with `InsufficientParticipants` below the keyring threshold and
/// refuses duplicate slots. The participant set is canonically ordered
/// before signing so Lagrange coefficients are computed over a stable
/// subset. The full message enters the signing context, so a signature
/// never verifies against another proposal's message.
pub fn sign(
    keyring: &GuardianKeyring,
    message: &[u8],
    participating_slots: &[GuardianSlot],
) -> Result<ThresholdSignature> {
    let mut ordered = BTreeSet::new();
    for slot in participating_slots {
        if !ordered.insert(slot.index()) {
            return Err(ThresholdError::DuplicateSlot(slot.index()));
        }
    }
    if ordered.len() < keyring.threshold as usize {
        return Err(ThresholdError::InsufficientParticipants {
            required: keyring.threshold as usize,
            got: ordered.len(),
        });
    }

    // Round 1: nonce commitments per participating slot
    let mut nonces = BTreeMap::new();
    let mut commitments = BTreeMap::new();
    for slot in &ordered {
        let identifier = slot_identifier(*slot)?;
        let key_package = deserialize_key_package(&keyring.share(*slot)?.data)?;
        let (slot_nonces, slot_commitments) =
            frost::round1::commit(key_package.signing_share(), &mut OsRng);
        nonces.insert(*slot, (key_package, slot_nonces));
        commitments.insert(identifier, slot_commitments);
    }

    let signing_package = frost::SigningPackage::new(commitments, message);

    // Round 2: each slot emits its binding-factor-weighted share
    let mut shares = BTreeMap::new();
    for (slot, (key_package, slot_nonces)) in &nonces {
        let identifier = slot_identifier(*slot)?;
        let share = frost::round2::sign(&signing_package, slot_nonces, key_package)
            .map_err(|e| ThresholdError::Signing(e.to_string()))?;
        shares.insert(identifier, share);
    }

    // Aggregation verifies every share against its verifying share before
    // combining, so a corrupt share is pinpointed rather than producing a
    // garbage signature.
    let pubkey_package = keyring.public_package()?;
    let signature = frost::aggregate(&signing_package, &shares, &pubkey_package)
        .map_err(|e| ThresholdError::InvalidShare(e.to_string()))?;

    let sig_bytes = signature
        .serialize()
        .map_err(|e| ThresholdError::Serialization(e.to_string()))?;
    debug!(
        participants = ordered.len(),
        message_len = message.len(),
        "threshold signature aggregated"
    );

    ThresholdSignature::from_bytes(&sig_bytes)
        .map_err(|e| ThresholdError::Serialization(e.to_string()))
}

/// Stateless signature verification against the group key
pub fn verify(message: &[u8], group_public: &GroupVerifyingKey, sig: &ThresholdSignature) -> bool {
    let Ok(verifying_key) = frost::VerifyingKey::deserialize(&group_public.0) else {
        return false;
    };
    let Ok(signature) = frost::Signature::deserialize(&sig.to_bytes()) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}

fn deserialize_key_package(data: &[u8]) -> Result<frost::keys::KeyPackage> {
    frost::keys::KeyPackage::deserialize(data)
        .map_err(|e| ThresholdError::Deserialization(e.to_string()))
}
