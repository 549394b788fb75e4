//! One-shot distributed key generation for the guardian set
//!
//! Runs the three-part FROST DKG for every guardian slot in-process at
//! system init. Each slot contributes a degree t-1 polynomial commitment
//! (part 1), exchanges shares (part 2), and derives its own secret share
//! plus the group public key (part 3). The result is persisted by the
//! caller; key material is immutable afterwards.

use std::collections::BTreeMap;

use frost_ristretto255 as frost;
use frost_ristretto255::keys::dkg as frost_dkg;
use frost_ristretto255::Identifier;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ThresholdError};
use crate::{GroupVerifyingKey, SlotShare};

/// Complete guardian key material produced by DKG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianKeyring {
    /// Total guardian slots
    pub guardian_count: u8,

    /// Signing threshold t
    pub threshold: u8,

    /// The aggregated group verifying key
    pub group_public: GroupVerifyingKey,

    /// Serialized public key package (per-slot verifying shares)
    pub pubkey_package: Vec<u8>,

    /// Per-slot secret key packages, indexed by slot
    pub shares: Vec<SlotShare>,
}

impl GuardianKeyring {
    /// Look up a slot's secret share
    pub fn share(&self, slot: u8) -> Result<&SlotShare> {
        self.shares
            .iter()
            .find(|s| s.slot == slot)
            .ok_or(ThresholdError::UnknownSlot(slot))
    }

    /// Deserialize the public key package
    pub(crate) fn public_package(&self) -> Result<frost::keys::PublicKeyPackage> {
        frost::keys::PublicKeyPackage::deserialize(&self.pubkey_package)
            .map_err(|e| ThresholdError::Deserialization(e.to_string()))
    }
}

/// Map a 0-based guardian slot to a FROST identifier (1-based)
pub(crate) fn slot_identifier(slot: u8) -> Result<Identifier> {
    Identifier::try_from(slot as u16 + 1)
        .map_err(|e| ThresholdError::KeyGeneration(e.to_string()))
}

/// Run the full DKG for `n` slots with threshold `t`
///
/// One-shot at boot. All three parts execute in-process; the share
/// exchange that a networked deployment would route between guardian
/// hosts happens over local maps here.
pub fn run_dkg(n: u8, t: u8) -> Result<GuardianKeyring> {
    if t < 2 || t > n {
        return Err(ThresholdError::InvalidThreshold {
            threshold: t as u16,
            participants: n as u16,
        });
    }

    info!(guardians = n, threshold = t, "running guardian DKG");

    // Part 1: every slot commits to its secret polynomial
    let mut round1_secrets = BTreeMap::new();
    let mut round1_packages = BTreeMap::new();
    for slot in 0..n {
        let identifier = slot_identifier(slot)?;
        let (secret, package) = frost_dkg::part1(identifier, n as u16, t as u16, &mut OsRng)
            .map_err(|e| ThresholdError::KeyGeneration(e.to_string()))?;
        round1_secrets.insert(identifier, secret);
        round1_packages.insert(identifier, package);
        debug!(slot, "DKG round 1 package generated");
    }

    // Part 2: each slot processes the others' round 1 packages and emits
    // one round 2 package per recipient
    let mut round2_secrets = BTreeMap::new();
    let mut round2_outboxes = BTreeMap::new();
    for slot in 0..n {
        let identifier = slot_identifier(slot)?;
        let received: BTreeMap<_, _> = round1_packages
            .iter()
            .filter(|(sender, _)| **sender != identifier)
            .map(|(sender, pkg)| (*sender, pkg.clone()))
            .collect();

        let secret = round1_secrets
            .remove(&identifier)
            .ok_or_else(|| ThresholdError::KeyGeneration("missing round 1 secret".into()))?;
        let (round2_secret, outbox) = frost_dkg::part2(secret, &received)
            .map_err(|e| ThresholdError::KeyGeneration(e.to_string()))?;
        round2_secrets.insert(identifier, round2_secret);
        round2_outboxes.insert(identifier, outbox);
        debug!(slot, "DKG round 2 packages generated");
    }

    // Part 3: each slot finalizes from the packages addressed to it
    let mut shares = Vec::with_capacity(n as usize);
    let mut group_public: Option<GroupVerifyingKey> = None;
    let mut pubkey_package_bytes: Option<Vec<u8>> = None;
    for slot in 0..n {
        let identifier = slot_identifier(slot)?;
        let received_round1: BTreeMap<_, _> = round1_packages
            .iter()
            .filter(|(sender, _)| **sender != identifier)
            .map(|(sender, pkg)| (*sender, pkg.clone()))
            .collect();
        let received_round2: BTreeMap<_, _> = round2_outboxes
            .iter()
            .filter(|(sender, _)| **sender != identifier)
            .filter_map(|(sender, outbox)| {
                outbox.get(&identifier).map(|pkg| (*sender, pkg.clone()))
            })
            .collect();

        let round2_secret = round2_secrets
            .get(&identifier)
            .ok_or_else(|| ThresholdError::KeyGeneration("missing round 2 secret".into()))?;
        let (key_package, pubkey_package) =
            frost_dkg::part3(round2_secret, &received_round1, &received_round2)
                .map_err(|e| ThresholdError::KeyGeneration(e.to_string()))?;

        let verifying_key_bytes = pubkey_package
            .verifying_key()
            .serialize()
            .map_err(|e| ThresholdError::Serialization(e.to_string()))?;
        let derived = GroupVerifyingKey(verifying_key_bytes.to_vec());
        match &group_public {
            None => {
                group_public = Some(derived);
                pubkey_package_bytes = Some(
                    pubkey_package
                        .serialize()
                        .map_err(|e| ThresholdError::Serialization(e.to_string()))?,
                );
            }
            Some(existing) if *existing == derived => {}
            Some(_) => {
                return Err(ThresholdError::KeyGeneration(
                    "slots derived divergent group keys".into(),
                ));
            }
        }

        let key_package_bytes = key_package
            .serialize()
            .map_err(|e| ThresholdError::Serialization(e.to_string()))?;
        shares.push(SlotShare {
            slot,
            data: key_package_bytes,
        });
    }

    let group_public =
        group_public.ok_or_else(|| ThresholdError::KeyGeneration("no slots finalized".into()))?;
    let pubkey_package = pubkey_package_bytes
        .ok_or_else(|| ThresholdError::KeyGeneration("no public package".into()))?;

    info!(group_key = %group_public.to_hex(), "guardian DKG complete");

    Ok(GuardianKeyring {
        guardian_count: n,
        threshold: t,
        group_public,
        pubkey_package,
        shares,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dkg_produces_all_shares() {
        let keyring = run_dkg(5, 3).unwrap();
        assert_eq!(keyring.guardian_count, 5);
        assert_eq!(keyring.threshold, 3);
        assert_eq!(keyring.shares.len(), 5);
        assert_eq!(keyring.group_public.0.len(), 32);
        for slot in 0..5 {
            assert_eq!(keyring.share(slot).unwrap().slot, slot);
        }
        assert!(keyring.share(5).is_err());
    }

    #[test]
    fn test_dkg_rejects_bad_threshold() {
        assert!(matches!(
            run_dkg(5, 1),
            Err(ThresholdError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            run_dkg(5, 6),
            Err(ThresholdError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_share_debug_is_redacted() {
        let keyring = run_dkg(3, 2).unwrap();
        let rendered = format!("{:?}", keyring.share(0).unwrap());
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains(&hex::encode(&keyring.share(0).unwrap().data)));
    }
}
