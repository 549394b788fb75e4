//! Guardian network surface
//!
//! Pull-based interface guardians use to participate: submit a
//! commitment, submit a reveal with its proof, poll the tally. The hub
//! verifies reveal proofs against the roster key set, feeds the store,
//! and assembles the threshold signature the moment voting resolves.

use std::sync::Arc;

use tracing::{info, warn};

use airlock_core::envelope::{Envelope, OutcomeTag, ThresholdSignature};
use airlock_core::types::{Fingerprint, GuardianSlot, VoteChoice};
use airlock_frost::{GroupVerifyingKey, GuardianKeyring};
use airlock_vote::{BallotOutcome, RevealProof, VoteCommitment, VoteError, VotingKeySet};

use crate::error::{DaemonError, Result};
use crate::store::{ProposalStore, TallySnapshot};

/// Server side of the guardian network
pub struct GuardianHub {
    keyring: GuardianKeyring,
    key_set: VotingKeySet,
    store: Arc<ProposalStore>,
    /// Slots whose signing shares are reachable for aggregation; in a
    /// networked deployment this shrinks when guardian hosts drop off
    signing_slots: Vec<GuardianSlot>,
}

impl GuardianHub {
    pub fn new(keyring: GuardianKeyring, key_set: VotingKeySet, store: Arc<ProposalStore>) -> Self {
        let signing_slots = (0..keyring.guardian_count).map(GuardianSlot).collect();
        Self {
            keyring,
            key_set,
            store,
            signing_slots,
        }
    }

    /// Restrict which slots can contribute signing shares
    pub fn with_signing_slots(mut self, slots: Vec<GuardianSlot>) -> Self {
        self.signing_slots = slots;
        self
    }

    /// The group verifying key guardians attest under
    pub fn group_public(&self) -> &GroupVerifyingKey {
        &self.keyring.group_public
    }

    /// Total guardian slots in this deployment
    pub fn guardian_count(&self) -> u8 {
        self.keyring.guardian_count
    }

    /// The public voting key roster
    pub fn key_set(&self) -> &VotingKeySet {
        &self.key_set
    }

    /// Accept a guardian's vote commitment
    pub async fn submit_commit(
        &self,
        fingerprint: Fingerprint,
        slot: GuardianSlot,
        commitment: VoteCommitment,
    ) -> Result<()> {
        self.store.record_commit(fingerprint, slot, commitment).await
    }

    /// Accept a guardian's reveal
    ///
    /// The proof is verified against the slot's earlier commitment and
    /// the roster key set. A failed proof rejects the reveal but keeps
    /// the commitment, so the slot may retry while the phase is open.
    /// When this reveal crosses a threshold, the hub signs the outcome
    /// and finalizes the proposal before returning.
    pub async fn submit_reveal(
        &self,
        fingerprint: Fingerprint,
        slot: GuardianSlot,
        vote: VoteChoice,
        proof: &RevealProof,
    ) -> Result<TallySnapshot> {
        let commitment = self
            .store
            .commitment_of(fingerprint, slot)
            .await?
            .ok_or(DaemonError::Vote(VoteError::RevealBeforeCommit(slot.index())))?;

        let proof_ok = proof
            .verify(&self.key_set, slot, vote, &commitment, &fingerprint)
            .is_ok();
        if !proof_ok {
            warn!(
                fingerprint = %fingerprint.short(),
                slot = slot.index(),
                "reveal proof failed verification"
            );
        }

        let decided = self
            .store
            .record_reveal(fingerprint, slot, vote, proof_ok)
            .await?;

        if let Some(outcome) = decided {
            self.finalize_with_signature(fingerprint, outcome).await?;
        }

        self.store.tally(fingerprint).await
    }

    /// Current tally snapshot for a proposal
    pub async fn poll_tally(&self, fingerprint: Fingerprint) -> Result<TallySnapshot> {
        self.store.tally(fingerprint).await
    }

    /// Threshold-sign an outcome tag over a proposal's envelope message
    ///
    /// Used directly by the orchestrator for the delayed-approved path.
    pub fn sign_outcome(
        &self,
        fingerprint: Fingerprint,
        outcome_tag: OutcomeTag,
    ) -> Result<ThresholdSignature> {
        let message = Envelope::signed_message(&fingerprint, outcome_tag);
        let signature = airlock_frost::sign(&self.keyring, &message, &self.signing_slots)?;
        Ok(signature)
    }

    /// Sign the voted outcome and finalize the proposal
    ///
    /// A signature assembly failure is recorded on the proposal so the
    /// orchestrator observes a terminal failure rather than hanging.
    async fn finalize_with_signature(
        &self,
        fingerprint: Fingerprint,
        outcome: BallotOutcome,
    ) -> Result<()> {
        let outcome_tag = match outcome {
            BallotOutcome::Approved => OutcomeTag::Approved,
            BallotOutcome::Rejected => OutcomeTag::Rejected,
        };
        let result = match self.sign_outcome(fingerprint, outcome_tag) {
            Ok(signature) => {
                info!(
                    fingerprint = %fingerprint.short(),
                    ?outcome,
                    "voting resolved; outcome signed"
                );
                self.store.finalize(fingerprint, outcome, signature).await
            }
            Err(e) => {
                warn!(
                    fingerprint = %fingerprint.short(),
                    error = %e,
                    "signature assembly failed for voted outcome"
                );
                self.store.fail_signing(fingerprint, e.to_string()).await
            }
        };
        // Losing the finalize race to the time-lock path is not an error
        // for the revealing guardian
        match result {
            Err(DaemonError::AlreadyFinalized(_)) => Ok(()),
            other => other,
        }
    }
}
