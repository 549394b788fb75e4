//! Ballot phase machine and tally rules
//!
//! Pure voting state for one proposal: who committed, who revealed,
//! running counts, and the terminal decision. Concurrency and deadlines
//! live in the proposal store; this type only enforces ordering and
//! threshold rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use airlock_core::types::{GuardianSlot, VoteChoice};

use crate::commitment::VoteCommitment;
use crate::error::{Result, VoteError};

/// Voting phase of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BallotPhase {
    /// Collecting commitments
    Commit,
    /// All slots committed; collecting reveals
    Reveal,
    /// Terminal with a decided outcome
    Complete,
    /// Terminal without an outcome
    Expired,
}

/// Decided outcome of a completed ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BallotOutcome {
    Approved,
    Rejected,
}

/// Running tally counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyCounts {
    pub approve: u8,
    pub reject: u8,
    pub abstain: u8,
    /// Slots that have not yet revealed an accepted vote
    pub pending: u8,
}

/// The voting state of one proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    guardian_count: u8,
    approval_threshold: u8,
    rejection_threshold: u8,
    phase: BallotPhase,
    outcome: Option<BallotOutcome>,
    commits: BTreeMap<u8, VoteCommitment>,
    reveals: BTreeMap<u8, VoteChoice>,
    counts: TallyCounts,
}

impl Ballot {
    /// Open a fresh ballot
    pub fn new(guardian_count: u8, approval_threshold: u8) -> Self {
        Self {
            guardian_count,
            approval_threshold,
            rejection_threshold: guardian_count - approval_threshold + 1,
            phase: BallotPhase::Commit,
            outcome: None,
            commits: BTreeMap::new(),
            reveals: BTreeMap::new(),
            counts: TallyCounts {
                pending: guardian_count,
                ..TallyCounts::default()
            },
        }
    }

    pub fn phase(&self) -> BallotPhase {
        self.phase
    }

    pub fn outcome(&self) -> Option<BallotOutcome> {
        self.outcome
    }

    pub fn counts(&self) -> TallyCounts {
        self.counts
    }

    /// The commitment a slot registered, if any
    pub fn commitment(&self, slot: GuardianSlot) -> Option<&VoteCommitment> {
        self.commits.get(&slot.index())
    }

    /// Whether the ballot reached a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, BallotPhase::Complete | BallotPhase::Expired)
    }

    /// Record a commitment
    ///
    /// Each slot commits at most once; commits after finalization or
    /// expiry are rejected. Slots beyond the ballot's guardian count are
    /// refused regardless of what the caller validated.
    pub fn record_commit(&mut self, slot: GuardianSlot, commitment: VoteCommitment) -> Result<()> {
        self.check_slot(slot)?;
        match self.phase {
            BallotPhase::Complete => return Err(VoteError::AlreadyFinalized),
            BallotPhase::Expired => return Err(VoteError::ThresholdNotReached),
            BallotPhase::Commit | BallotPhase::Reveal => {}
        }
        if self.commits.contains_key(&slot.index()) {
            return Err(VoteError::DoubleCommit(slot.index()));
        }

        self.commits.insert(slot.index(), commitment);
        if self.commits.len() == self.guardian_count as usize {
            self.phase = BallotPhase::Reveal;
            debug!("all guardians committed; reveal phase open");
        }
        Ok(())
    }

    /// Record a verified reveal
    ///
    /// `proof_ok` is the caller's verification result: a failed proof
    /// rejects the reveal without consuming the commit, so the slot may
    /// try again while the phase is open. An accepted reveal updates the
    /// tally atomically and finalizes the ballot the moment a threshold
    /// is crossed.
    pub fn record_reveal(
        &mut self,
        slot: GuardianSlot,
        vote: VoteChoice,
        proof_ok: bool,
    ) -> Result<Option<BallotOutcome>> {
        self.check_slot(slot)?;
        match self.phase {
            BallotPhase::Complete => return Err(VoteError::AlreadyFinalized),
            BallotPhase::Expired => return Err(VoteError::ThresholdNotReached),
            BallotPhase::Commit => return Err(VoteError::RevealPhaseNotOpen),
            BallotPhase::Reveal => {}
        }
        if !self.commits.contains_key(&slot.index()) {
            return Err(VoteError::RevealBeforeCommit(slot.index()));
        }
        if self.reveals.contains_key(&slot.index()) {
            return Err(VoteError::AlreadyRevealed(slot.index()));
        }
        if !proof_ok {
            return Err(VoteError::VoteProofInvalid(slot.index()));
        }

        self.reveals.insert(slot.index(), vote);
        match vote {
            VoteChoice::Approve => self.counts.approve += 1,
            VoteChoice::Reject => self.counts.reject += 1,
            VoteChoice::Abstain => self.counts.abstain += 1,
        }
        self.counts.pending -= 1;

        if self.counts.approve >= self.approval_threshold {
            self.phase = BallotPhase::Complete;
            self.outcome = Some(BallotOutcome::Approved);
        } else if self.counts.reject >= self.rejection_threshold {
            self.phase = BallotPhase::Complete;
            self.outcome = Some(BallotOutcome::Rejected);
        }
        Ok(self.outcome)
    }

    /// Expire the ballot if it has not completed
    ///
    /// Idempotent; a completed ballot keeps its outcome.
    pub fn expire(&mut self) {
        if !self.is_terminal() {
            self.phase = BallotPhase::Expired;
        }
    }

    fn check_slot(&self, slot: GuardianSlot) -> Result<()> {
        if slot.index() >= self.guardian_count {
            return Err(VoteError::SlotOutOfRange {
                slot: slot.index(),
                guardian_count: self.guardian_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commitment(tag: u8) -> VoteCommitment {
        VoteCommitment([tag; 32])
    }

    fn commit_all(ballot: &mut Ballot, n: u8) {
        for slot in 0..n {
            ballot.record_commit(GuardianSlot(slot), commitment(slot)).unwrap();
        }
    }

    #[test]
    fn test_phase_advances_after_all_commits() {
        let mut ballot = Ballot::new(10, 7);
        assert_eq!(ballot.phase(), BallotPhase::Commit);
        commit_all(&mut ballot, 10);
        assert_eq!(ballot.phase(), BallotPhase::Reveal);
    }

    #[test]
    fn test_out_of_range_slot_rejected() {
        // A 5-guardian ballot refuses slots 5+ even though they would be
        // legal under the default roster size
        let mut ballot = Ballot::new(5, 4);
        assert_eq!(
            ballot.record_commit(GuardianSlot(5), commitment(5)),
            Err(VoteError::SlotOutOfRange {
                slot: 5,
                guardian_count: 5
            })
        );
        assert_eq!(
            ballot.record_reveal(GuardianSlot(9), VoteChoice::Approve, true),
            Err(VoteError::SlotOutOfRange {
                slot: 9,
                guardian_count: 5
            })
        );

        // The phantom commit left no trace; the real roster still fills
        // and transitions normally
        for slot in 0..5 {
            ballot.record_commit(GuardianSlot(slot), commitment(slot)).unwrap();
        }
        assert_eq!(ballot.phase(), BallotPhase::Reveal);
        assert_eq!(ballot.counts().pending, 5);
    }

    #[test]
    fn test_double_commit_rejected() {
        let mut ballot = Ballot::new(10, 7);
        ballot.record_commit(GuardianSlot(0), commitment(0)).unwrap();
        assert_eq!(
            ballot.record_commit(GuardianSlot(0), commitment(1)),
            Err(VoteError::DoubleCommit(0))
        );
    }

    #[test]
    fn test_reveal_before_commit_phase_rejected() {
        let mut ballot = Ballot::new(10, 7);
        ballot.record_commit(GuardianSlot(0), commitment(0)).unwrap();
        assert_eq!(
            ballot.record_reveal(GuardianSlot(0), VoteChoice::Approve, true),
            Err(VoteError::RevealPhaseNotOpen)
        );
    }

    #[test]
    fn test_exact_threshold_approves_immediately() {
        let mut ballot = Ballot::new(10, 7);
        commit_all(&mut ballot, 10);

        for slot in 0..6 {
            let outcome = ballot
                .record_reveal(GuardianSlot(slot), VoteChoice::Approve, true)
                .unwrap();
            assert_eq!(outcome, None);
        }
        // The 7th approval is sufficient and immediate
        let outcome = ballot
            .record_reveal(GuardianSlot(6), VoteChoice::Approve, true)
            .unwrap();
        assert_eq!(outcome, Some(BallotOutcome::Approved));
        assert_eq!(ballot.phase(), BallotPhase::Complete);

        // An 8th approval is observable but rejected: the ballot is frozen
        assert_eq!(
            ballot.record_reveal(GuardianSlot(7), VoteChoice::Approve, true),
            Err(VoteError::AlreadyFinalized)
        );
    }

    #[test]
    fn test_exact_threshold_rejects_immediately() {
        let mut ballot = Ballot::new(10, 7);
        commit_all(&mut ballot, 10);

        for slot in 0..3 {
            ballot
                .record_reveal(GuardianSlot(slot), VoteChoice::Reject, true)
                .unwrap();
        }
        // Rejection threshold is N - t + 1 = 4
        let outcome = ballot
            .record_reveal(GuardianSlot(3), VoteChoice::Reject, true)
            .unwrap();
        assert_eq!(outcome, Some(BallotOutcome::Rejected));
    }

    #[test]
    fn test_counts_always_sum_to_guardian_count() {
        let mut ballot = Ballot::new(10, 7);
        commit_all(&mut ballot, 10);

        let votes = [
            VoteChoice::Approve,
            VoteChoice::Reject,
            VoteChoice::Abstain,
            VoteChoice::Approve,
            VoteChoice::Abstain,
        ];
        for (slot, vote) in votes.iter().enumerate() {
            ballot.record_reveal(GuardianSlot(slot as u8), *vote, true).unwrap();
            let c = ballot.counts();
            assert_eq!(c.approve + c.reject + c.abstain + c.pending, 10);
        }
    }

    #[test]
    fn test_invalid_proof_preserves_commit_and_allows_retry() {
        let mut ballot = Ballot::new(10, 7);
        commit_all(&mut ballot, 10);

        assert_eq!(
            ballot.record_reveal(GuardianSlot(2), VoteChoice::Approve, false),
            Err(VoteError::VoteProofInvalid(2))
        );
        // Commit preserved; a valid re-reveal succeeds
        assert!(ballot.commitment(GuardianSlot(2)).is_some());
        ballot
            .record_reveal(GuardianSlot(2), VoteChoice::Approve, true)
            .unwrap();
        assert_eq!(ballot.counts().approve, 1);
    }

    #[test]
    fn test_expired_ballot_rejects_reveals() {
        let mut ballot = Ballot::new(10, 7);
        commit_all(&mut ballot, 10);
        ballot.expire();
        assert_eq!(ballot.phase(), BallotPhase::Expired);
        assert_eq!(
            ballot.record_reveal(GuardianSlot(0), VoteChoice::Approve, true),
            Err(VoteError::ThresholdNotReached)
        );
    }

    #[test]
    fn test_expire_does_not_overwrite_completion() {
        let mut ballot = Ballot::new(10, 7);
        commit_all(&mut ballot, 10);
        for slot in 0..7 {
            ballot
                .record_reveal(GuardianSlot(slot), VoteChoice::Approve, true)
                .unwrap();
        }
        assert_eq!(ballot.phase(), BallotPhase::Complete);
        ballot.expire();
        assert_eq!(ballot.phase(), BallotPhase::Complete);
        assert_eq!(ballot.outcome(), Some(BallotOutcome::Approved));
    }

    #[test]
    fn test_no_ballot_reaches_both_outcomes() {
        // 6 approvals and 3 rejections cannot finalize; the next reveal
        // decides exactly one outcome
        let mut ballot = Ballot::new(10, 7);
        commit_all(&mut ballot, 10);
        for slot in 0..6 {
            ballot
                .record_reveal(GuardianSlot(slot), VoteChoice::Approve, true)
                .unwrap();
        }
        for slot in 6..9 {
            ballot
                .record_reveal(GuardianSlot(slot), VoteChoice::Reject, true)
                .unwrap();
        }
        assert_eq!(ballot.phase(), BallotPhase::Reveal);

        let outcome = ballot
            .record_reveal(GuardianSlot(9), VoteChoice::Reject, true)
            .unwrap();
        assert_eq!(outcome, Some(BallotOutcome::Rejected));
        // Frozen thereafter
        assert!(ballot
            .record_reveal(GuardianSlot(9), VoteChoice::Approve, true)
            .is_err());
    }
}
