//! Error types for threshold signature operations

use thiserror::Error;

/// Result type for threshold signature operations
pub type Result<T> = std::result::Result<T, ThresholdError>;

/// Errors that can occur during DKG or signing
#[derive(Debug, Error)]
pub enum ThresholdError {
    /// Fewer participating slots than the signing threshold
    #[error("Insufficient participants: need at least {required}, got {got}")]
    InsufficientParticipants { required: usize, got: usize },

    /// The same slot was named twice in the participant set
    #[error("Duplicate guardian slot {0} in participant set")]
    DuplicateSlot(u8),

    /// Slot index not present in the keyring
    #[error("Unknown guardian slot {0}")]
    UnknownSlot(u8),

    /// Invalid threshold parameters
    #[error("Invalid threshold: {threshold} of {participants}")]
    InvalidThreshold { threshold: u16, participants: u16 },

    /// Distributed key generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// A signing round failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A signature share failed verification during aggregation
    #[error("Invalid signature share: {0}")]
    InvalidShare(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
