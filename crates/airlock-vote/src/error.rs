//! Error types for voting operations

use thiserror::Error;

/// Result type for voting operations
pub type Result<T> = std::result::Result<T, VoteError>;

/// Errors that can occur during commit-reveal voting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// Slot index beyond the ballot's guardian count
    #[error("Guardian slot {slot} out of range for {guardian_count} guardians")]
    SlotOutOfRange { slot: u8, guardian_count: u8 },

    /// Slot committed twice
    #[error("Guardian slot {0} already committed")]
    DoubleCommit(u8),

    /// Reveal arrived before the slot's commit
    #[error("Guardian slot {0} revealed before committing")]
    RevealBeforeCommit(u8),

    /// Reveal arrived while the ballot is still collecting commits
    #[error("Ballot still in commit phase; reveals not yet open")]
    RevealPhaseNotOpen,

    /// Reveal proof failed verification; the commit is preserved and the
    /// slot may re-reveal while the phase remains open
    #[error("Reveal proof invalid for guardian slot {0}")]
    VoteProofInvalid(u8),

    /// Slot already has an accepted reveal
    #[error("Guardian slot {0} already revealed")]
    AlreadyRevealed(u8),

    /// The ballot reached a decided terminal state; no further mutation
    #[error("Ballot already finalized")]
    AlreadyFinalized,

    /// The ballot expired before reaching a threshold
    #[error("Voting threshold not reached before deadline")]
    ThresholdNotReached,

    /// Malformed proof or key bytes
    #[error("Malformed voting material: {0}")]
    Malformed(String),
}
