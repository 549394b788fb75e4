//! Proposal store
//!
//! In-process container mapping fingerprint to proposal lifecycle state.
//! Every mutation is serialized behind the store lock; snapshots are
//! cheap clones. Each proposal carries a watch channel so the
//! orchestrator can await vote resolution without polling.

use std::collections::HashMap;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use airlock_core::envelope::ThresholdSignature;
use airlock_core::types::{Fingerprint, GuardianSlot, VoteChoice};
use airlock_vdf::JobId;
use airlock_vote::{Ballot, BallotOutcome, BallotPhase, TallyCounts, VoteCommitment};

use crate::error::{DaemonError, Result};

/// Terminal outcome of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalOutcome {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// Resolution signal delivered to the orchestrator
#[derive(Debug, Clone)]
pub enum VoteResolution {
    /// Voting crossed a threshold and the outcome is signed
    Decided {
        outcome: BallotOutcome,
        signature: ThresholdSignature,
    },
    /// Deadline passed without a threshold
    Expired,
    /// The outcome was decided but signature assembly failed
    SigningFailed { reason: String },
}

/// A proposal's lifecycle state
#[derive(Debug, Clone)]
pub struct Proposal {
    pub fingerprint: Fingerprint,
    pub created_at: u64,
    pub expires_at: u64,
    pub ballot: Ballot,
    pub vdf_job: Option<JobId>,
    pub outcome: ProposalOutcome,
    pub threshold_signature: Option<ThresholdSignature>,
}

/// Tally snapshot exposed to guardians and the progress stream
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TallySnapshot {
    pub counts: TallyCounts,
    pub phase: BallotPhase,
    pub outcome: ProposalOutcome,
    pub threshold_signature: Option<ThresholdSignature>,
}

struct ProposalEntry {
    proposal: Proposal,
    resolution_tx: watch::Sender<Option<VoteResolution>>,
    resolution_rx: watch::Receiver<Option<VoteResolution>>,
}

/// The in-process proposal container
pub struct ProposalStore {
    proposals: RwLock<HashMap<Fingerprint, ProposalEntry>>,
    guardian_count: u8,
    approval_threshold: u8,
}

impl ProposalStore {
    pub fn new(guardian_count: u8, approval_threshold: u8) -> Self {
        Self {
            proposals: RwLock::new(HashMap::new()),
            guardian_count,
            approval_threshold,
        }
    }

    /// Open a proposal keyed by fingerprint
    pub async fn open(&self, fingerprint: Fingerprint, now: u64, deadline_secs: u64) -> Result<()> {
        let mut proposals = self.proposals.write().await;
        if proposals.contains_key(&fingerprint) {
            return Err(DaemonError::DuplicateProposal(fingerprint));
        }
        let (resolution_tx, resolution_rx) = watch::channel(None);
        proposals.insert(
            fingerprint,
            ProposalEntry {
                proposal: Proposal {
                    fingerprint,
                    created_at: now,
                    expires_at: now + deadline_secs,
                    ballot: Ballot::new(self.guardian_count, self.approval_threshold),
                    vdf_job: None,
                    outcome: ProposalOutcome::Pending,
                    threshold_signature: None,
                },
                resolution_tx,
                resolution_rx,
            },
        );
        info!(fingerprint = %fingerprint.short(), "proposal opened");
        Ok(())
    }

    /// Record a guardian's commitment
    pub async fn record_commit(
        &self,
        fingerprint: Fingerprint,
        slot: GuardianSlot,
        commitment: VoteCommitment,
    ) -> Result<()> {
        let mut proposals = self.proposals.write().await;
        let entry = proposals
            .get_mut(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        Self::check_open(entry, fingerprint)?;
        entry.proposal.ballot.record_commit(slot, commitment)?;
        debug!(fingerprint = %fingerprint.short(), slot = slot.index(), "commit recorded");
        Ok(())
    }

    /// Record a guardian's reveal with its proof verification result
    ///
    /// Returns the decided outcome when this reveal crosses a threshold.
    pub async fn record_reveal(
        &self,
        fingerprint: Fingerprint,
        slot: GuardianSlot,
        vote: VoteChoice,
        proof_ok: bool,
    ) -> Result<Option<BallotOutcome>> {
        let mut proposals = self.proposals.write().await;
        let entry = proposals
            .get_mut(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        Self::check_open(entry, fingerprint)?;
        let decided = entry.proposal.ballot.record_reveal(slot, vote, proof_ok)?;
        debug!(
            fingerprint = %fingerprint.short(),
            slot = slot.index(),
            decided = ?decided,
            "reveal recorded"
        );
        Ok(decided)
    }

    /// The commitment a slot registered, if any
    pub async fn commitment_of(
        &self,
        fingerprint: Fingerprint,
        slot: GuardianSlot,
    ) -> Result<Option<VoteCommitment>> {
        let proposals = self.proposals.read().await;
        let entry = proposals
            .get(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        Ok(entry.proposal.ballot.commitment(slot).copied())
    }

    /// Attach the VDF job armed for this proposal
    pub async fn set_vdf_job(&self, fingerprint: Fingerprint, job: JobId) -> Result<()> {
        let mut proposals = self.proposals.write().await;
        let entry = proposals
            .get_mut(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        entry.proposal.vdf_job = Some(job);
        Ok(())
    }

    /// Finalize with a signed voted outcome; exclusive, first writer wins
    pub async fn finalize(
        &self,
        fingerprint: Fingerprint,
        outcome: BallotOutcome,
        signature: ThresholdSignature,
    ) -> Result<()> {
        let mut proposals = self.proposals.write().await;
        let entry = proposals
            .get_mut(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        if entry.proposal.outcome != ProposalOutcome::Pending {
            return Err(DaemonError::AlreadyFinalized(fingerprint));
        }
        entry.proposal.outcome = match outcome {
            BallotOutcome::Approved => ProposalOutcome::Approved,
            BallotOutcome::Rejected => ProposalOutcome::Rejected,
        };
        entry.proposal.threshold_signature = Some(signature);
        let _ = entry
            .resolution_tx
            .send(Some(VoteResolution::Decided { outcome, signature }));
        info!(fingerprint = %fingerprint.short(), ?outcome, "proposal finalized");
        Ok(())
    }

    /// Record a signature assembly failure for a decided ballot
    pub async fn fail_signing(&self, fingerprint: Fingerprint, reason: String) -> Result<()> {
        let mut proposals = self.proposals.write().await;
        let entry = proposals
            .get_mut(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        if entry.proposal.outcome != ProposalOutcome::Pending {
            return Err(DaemonError::AlreadyFinalized(fingerprint));
        }
        entry.proposal.outcome = ProposalOutcome::Expired;
        let _ = entry
            .resolution_tx
            .send(Some(VoteResolution::SigningFailed { reason }));
        Ok(())
    }

    /// Expire one proposal if still pending
    pub async fn expire(&self, fingerprint: Fingerprint) -> Result<bool> {
        let mut proposals = self.proposals.write().await;
        let entry = proposals
            .get_mut(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        Ok(Self::expire_entry(entry))
    }

    /// Expire every pending proposal whose deadline has passed
    pub async fn expire_sweep(&self, now: u64) -> Vec<Fingerprint> {
        let mut proposals = self.proposals.write().await;
        let mut expired = Vec::new();
        for (fingerprint, entry) in proposals.iter_mut() {
            if entry.proposal.outcome == ProposalOutcome::Pending
                && now >= entry.proposal.expires_at
                && Self::expire_entry(entry)
            {
                expired.push(*fingerprint);
            }
        }
        expired
    }

    /// Gate guardian mutations on the proposal outcome
    ///
    /// An expired proposal reads as a missed deadline; a decided one as
    /// finalized.
    fn check_open(entry: &ProposalEntry, fingerprint: Fingerprint) -> Result<()> {
        match entry.proposal.outcome {
            ProposalOutcome::Pending => Ok(()),
            ProposalOutcome::Expired => {
                Err(airlock_vote::VoteError::ThresholdNotReached.into())
            }
            ProposalOutcome::Approved | ProposalOutcome::Rejected => {
                Err(DaemonError::AlreadyFinalized(fingerprint))
            }
        }
    }

    fn expire_entry(entry: &mut ProposalEntry) -> bool {
        if entry.proposal.outcome != ProposalOutcome::Pending {
            return false;
        }
        entry.proposal.ballot.expire();
        entry.proposal.outcome = ProposalOutcome::Expired;
        let _ = entry.resolution_tx.send(Some(VoteResolution::Expired));
        info!(fingerprint = %entry.proposal.fingerprint.short(), "proposal expired");
        true
    }

    /// Lock-free-style read of the tally state
    pub async fn tally(&self, fingerprint: Fingerprint) -> Result<TallySnapshot> {
        let proposals = self.proposals.read().await;
        let entry = proposals
            .get(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        Ok(TallySnapshot {
            counts: entry.proposal.ballot.counts(),
            phase: entry.proposal.ballot.phase(),
            outcome: entry.proposal.outcome,
            threshold_signature: entry.proposal.threshold_signature,
        })
    }

    /// Full proposal snapshot
    pub async fn snapshot(&self, fingerprint: Fingerprint) -> Result<Proposal> {
        let proposals = self.proposals.read().await;
        let entry = proposals
            .get(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        Ok(entry.proposal.clone())
    }

    /// Subscribe to the proposal's resolution signal
    pub async fn subscribe(
        &self,
        fingerprint: Fingerprint,
    ) -> Result<watch::Receiver<Option<VoteResolution>>> {
        let proposals = self.proposals.read().await;
        let entry = proposals
            .get(&fingerprint)
            .ok_or(DaemonError::UnknownProposal(fingerprint))?;
        Ok(entry.resolution_rx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(tag: u8) -> Fingerprint {
        Fingerprint::new([tag; 32])
    }

    fn commitment(tag: u8) -> VoteCommitment {
        VoteCommitment([tag; 32])
    }

    fn store() -> ProposalStore {
        ProposalStore::new(10, 7)
    }

    async fn commit_all(store: &ProposalStore, fingerprint: Fingerprint) {
        for slot in 0..10 {
            store
                .record_commit(fingerprint, GuardianSlot(slot), commitment(slot))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_duplicate_open_rejected() {
        let store = store();
        store.open(fp(1), 0, 300).await.unwrap();
        assert!(matches!(
            store.open(fp(1), 1, 300).await,
            Err(DaemonError::DuplicateProposal(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_proposal_errors() {
        let store = store();
        assert!(matches!(
            store.tally(fp(9)).await,
            Err(DaemonError::UnknownProposal(_))
        ));
        assert!(matches!(
            store
                .record_commit(fp(9), GuardianSlot(0), commitment(0))
                .await,
            Err(DaemonError::UnknownProposal(_))
        ));
    }

    #[tokio::test]
    async fn test_reveal_before_commit_rejected() {
        let store = store();
        store.open(fp(1), 0, 300).await.unwrap();
        for slot in 0..9 {
            store
                .record_commit(fp(1), GuardianSlot(slot), commitment(slot))
                .await
                .unwrap();
        }
        // Phase still commit; reveals refused with a precise kind
        let err = store
            .record_reveal(fp(1), GuardianSlot(0), VoteChoice::Approve, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Vote(airlock_vote::VoteError::RevealPhaseNotOpen)
        ));
    }

    #[tokio::test]
    async fn test_resolution_watch_fires_on_finalize() {
        let store = store();
        store.open(fp(1), 0, 300).await.unwrap();
        let mut rx = store.subscribe(fp(1)).await.unwrap();
        assert!(rx.borrow().is_none());

        let sig = ThresholdSignature {
            r: [1u8; 32],
            z: [2u8; 32],
        };
        store
            .finalize(fp(1), BallotOutcome::Approved, sig)
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert!(matches!(
            rx.borrow().clone(),
            Some(VoteResolution::Decided {
                outcome: BallotOutcome::Approved,
                ..
            })
        ));

        // Finalize is exclusive
        assert!(matches!(
            store.finalize(fp(1), BallotOutcome::Rejected, sig).await,
            Err(DaemonError::AlreadyFinalized(_))
        ));
    }

    #[tokio::test]
    async fn test_expire_sweep_only_past_deadline() {
        let store = store();
        store.open(fp(1), 100, 300).await.unwrap();
        store.open(fp(2), 100, 600).await.unwrap();

        let expired = store.expire_sweep(450).await;
        assert_eq!(expired, vec![fp(1)]);
        assert_eq!(
            store.tally(fp(1)).await.unwrap().outcome,
            ProposalOutcome::Expired
        );
        assert_eq!(
            store.tally(fp(2)).await.unwrap().outcome,
            ProposalOutcome::Pending
        );

        // Sweep is idempotent
        assert!(store.expire_sweep(450).await.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_after_expiry_reports_missed_deadline() {
        let store = store();
        store.open(fp(1), 0, 10).await.unwrap();
        commit_all(&store, fp(1)).await;
        store.expire_sweep(50).await;

        // A reveal arriving after the deadline reads as a missed threshold
        assert!(matches!(
            store
                .record_reveal(fp(1), GuardianSlot(0), VoteChoice::Approve, true)
                .await,
            Err(DaemonError::Vote(
                airlock_vote::VoteError::ThresholdNotReached
            ))
        ));
        assert!(matches!(
            store
                .record_commit(fp(1), GuardianSlot(0), commitment(0))
                .await,
            Err(DaemonError::Vote(
                airlock_vote::VoteError::ThresholdNotReached
            ))
        ));
    }

    #[tokio::test]
    async fn test_mutation_after_finalize_reports_finalized() {
        let store = store();
        store.open(fp(1), 0, 300).await.unwrap();
        let sig = ThresholdSignature {
            r: [1u8; 32],
            z: [2u8; 32],
        };
        store
            .finalize(fp(1), BallotOutcome::Approved, sig)
            .await
            .unwrap();

        assert!(matches!(
            store
                .record_commit(fp(1), GuardianSlot(0), commitment(0))
                .await,
            Err(DaemonError::AlreadyFinalized(_))
        ));
    }

    #[tokio::test]
    async fn test_tally_counts_track_reveals() {
        let store = store();
        store.open(fp(1), 0, 300).await.unwrap();
        commit_all(&store, fp(1)).await;

        store
            .record_reveal(fp(1), GuardianSlot(0), VoteChoice::Approve, true)
            .await
            .unwrap();
        store
            .record_reveal(fp(1), GuardianSlot(1), VoteChoice::Reject, true)
            .await
            .unwrap();

        let tally = store.tally(fp(1)).await.unwrap();
        assert_eq!(tally.counts.approve, 1);
        assert_eq!(tally.counts.reject, 1);
        assert_eq!(tally.counts.pending, 8);
        assert_eq!(
            tally.counts.approve + tally.counts.reject + tally.counts.abstain + tally.counts.pending,
            10
        );
    }
}
