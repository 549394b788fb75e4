//! Airlock Vote - commit-reveal guardian voting
//!
//! Guardians hide their vote behind an algebraic commitment during the
//! commit phase, then reveal it together with a proof that (a) the
//! revealer holds a legitimate guardian key and (b) the revealed vote
//! opens the earlier commitment. Tallying over accepted reveals drives a
//! proposal to exactly one terminal state.

pub mod ballot;
pub mod commitment;
pub mod error;
pub mod keys;
pub mod poseidon;
pub mod proof;

pub use ballot::{Ballot, BallotOutcome, BallotPhase, TallyCounts};
pub use commitment::VoteCommitment;
pub use error::{Result, VoteError};
pub use keys::{GuardianVotingKey, VotingKeySet};
pub use proof::RevealProof;
