//! Error types for daemon operations

use thiserror::Error;

use airlock_core::types::Fingerprint;

/// Result type alias using the daemon error type
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Errors that can occur during daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Intent failed structural validation at the boundary
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    /// A proposal with this fingerprint is already open
    #[error("Proposal {} already open", .0.short())]
    DuplicateProposal(Fingerprint),

    /// No proposal with this fingerprint
    #[error("Unknown proposal {}", .0.short())]
    UnknownProposal(Fingerprint),

    /// Proposal already reached a terminal outcome
    #[error("Proposal {} already finalized", .0.short())]
    AlreadyFinalized(Fingerprint),

    /// Commit-reveal protocol violation
    #[error(transparent)]
    Vote(#[from] airlock_vote::VoteError),

    /// Threshold signature failure
    #[error(transparent)]
    Threshold(#[from] airlock_frost::ThresholdError),

    /// VDF engine failure
    #[error(transparent)]
    Vdf(#[from] airlock_vdf::VdfError),

    /// Executor adapter failure
    #[error("Executor error: {0}")]
    Executor(String),

    /// IPC transport error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for DaemonError {
    fn from(e: serde_json::Error) -> Self {
        DaemonError::Serialization(e.to_string())
    }
}
