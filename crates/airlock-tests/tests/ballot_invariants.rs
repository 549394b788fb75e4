//! Property tests for ballot and tally invariants
//!
//! Checks that hold for every interleaving of commits and reveals: count
//! conservation, single-commit-per-slot, monotone finalization, and the
//! impossibility of reaching both terminal outcomes.

use proptest::prelude::*;

use airlock_core::types::{GuardianSlot, VoteChoice};
use airlock_vote::{Ballot, BallotOutcome, BallotPhase, VoteCommitment, VoteError};

const GUARDIANS: u8 = 10;
const APPROVAL_THRESHOLD: u8 = 7;
const REJECTION_THRESHOLD: u8 = 4;

/// One guardian action against the ballot
#[derive(Debug, Clone)]
enum Action {
    Commit { slot: u8 },
    Reveal { slot: u8, vote: VoteChoice, proof_ok: bool },
    Expire,
}

fn arb_vote() -> impl Strategy<Value = VoteChoice> {
    prop_oneof![
        Just(VoteChoice::Reject),
        Just(VoteChoice::Approve),
        Just(VoteChoice::Abstain),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0u8..GUARDIANS).prop_map(|slot| Action::Commit { slot }),
        8 => (0u8..GUARDIANS, arb_vote(), prop::bool::weighted(0.9))
            .prop_map(|(slot, vote, proof_ok)| Action::Reveal { slot, vote, proof_ok }),
        1 => Just(Action::Expire),
    ]
}

proptest! {
    /// approve + reject + abstain + pending always equals the guardian count
    #[test]
    fn counts_are_conserved(actions in prop::collection::vec(arb_action(), 0..120)) {
        let mut ballot = Ballot::new(GUARDIANS, APPROVAL_THRESHOLD);
        for action in actions {
            let _ = apply(&mut ballot, &action);
            let c = ballot.counts();
            prop_assert_eq!(
                c.approve as u16 + c.reject as u16 + c.abstain as u16 + c.pending as u16,
                GUARDIANS as u16
            );
        }
    }

    /// A crossed threshold finalizes with the matching outcome, and no
    /// outcome appears without its threshold
    #[test]
    fn thresholds_decide_terminal_state(actions in prop::collection::vec(arb_action(), 0..120)) {
        let mut ballot = Ballot::new(GUARDIANS, APPROVAL_THRESHOLD);
        for action in actions {
            let _ = apply(&mut ballot, &action);
            let c = ballot.counts();
            if c.approve >= APPROVAL_THRESHOLD {
                prop_assert_eq!(ballot.outcome(), Some(BallotOutcome::Approved));
            }
            if c.reject >= REJECTION_THRESHOLD {
                prop_assert_eq!(ballot.outcome(), Some(BallotOutcome::Rejected));
            }
            if let Some(outcome) = ballot.outcome() {
                match outcome {
                    BallotOutcome::Approved => prop_assert!(c.approve >= APPROVAL_THRESHOLD),
                    BallotOutcome::Rejected => prop_assert!(c.reject >= REJECTION_THRESHOLD),
                }
            }
        }
    }

    /// The decided outcome never changes once set, and terminal ballots
    /// reject every further mutation
    #[test]
    fn finalization_is_monotone(actions in prop::collection::vec(arb_action(), 0..200)) {
        let mut ballot = Ballot::new(GUARDIANS, APPROVAL_THRESHOLD);
        let mut decided: Option<BallotOutcome> = None;
        for action in actions {
            let was_complete = ballot.phase() == BallotPhase::Complete;
            let result = apply(&mut ballot, &action);

            if let Some(previous) = decided {
                prop_assert_eq!(ballot.outcome(), Some(previous));
            }
            decided = ballot.outcome();

            if was_complete {
                match action {
                    Action::Expire => prop_assert_eq!(ballot.phase(), BallotPhase::Complete),
                    _ => prop_assert!(result.is_err()),
                }
            }
        }
    }

    /// Double commits and reveals-before-commit never mutate state
    #[test]
    fn ordering_violations_are_rejected(actions in prop::collection::vec(arb_action(), 0..120)) {
        let mut ballot = Ballot::new(GUARDIANS, APPROVAL_THRESHOLD);
        let mut committed = [false; GUARDIANS as usize];
        let mut revealed = [false; GUARDIANS as usize];

        for action in actions {
            match action {
                Action::Commit { slot } => {
                    let result = ballot.record_commit(GuardianSlot(slot), VoteCommitment([slot; 32]));
                    if committed[slot as usize] && !ballot.is_terminal() {
                        prop_assert_eq!(result.clone(), Err(VoteError::DoubleCommit(slot)));
                    }
                    if result.is_ok() {
                        committed[slot as usize] = true;
                    }
                }
                Action::Reveal { slot, vote, proof_ok } => {
                    let result = ballot.record_reveal(GuardianSlot(slot), vote, proof_ok);
                    if !committed[slot as usize] && result.is_ok() {
                        prop_assert!(false, "reveal accepted without commit");
                    }
                    if revealed[slot as usize] && result.is_ok() {
                        prop_assert!(false, "slot revealed twice");
                    }
                    if result.is_ok() {
                        revealed[slot as usize] = true;
                    }
                }
                Action::Expire => ballot.expire(),
            }
        }
    }
}

fn apply(ballot: &mut Ballot, action: &Action) -> Result<(), VoteError> {
    match action {
        Action::Commit { slot } => {
            ballot.record_commit(GuardianSlot(*slot), VoteCommitment([*slot; 32]))
        }
        Action::Reveal { slot, vote, proof_ok } => ballot
            .record_reveal(GuardianSlot(*slot), *vote, *proof_ok)
            .map(|_| ()),
        Action::Expire => {
            ballot.expire();
            Ok(())
        }
    }
}
