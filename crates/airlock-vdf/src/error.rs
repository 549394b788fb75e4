//! Error types for VDF operations

use thiserror::Error;

use crate::job::JobId;

/// Result type for VDF operations
pub type Result<T> = std::result::Result<T, VdfError>;

/// Errors that can occur during VDF operations
#[derive(Debug, Clone, Error)]
pub enum VdfError {
    /// Job id not known to the engine
    #[error("Unknown VDF job: {0}")]
    UnknownJob(JobId),

    /// Job computation failed
    ///
    /// Fatal for that job only; never propagates to other jobs.
    #[error("VDF job {job} failed: {reason}")]
    JobFailed { job: JobId, reason: String },

    /// Iteration count outside the accepted range
    #[error("VDF iterations out of range: {0}")]
    IterationsOutOfRange(u64),

    /// Proof bytes could not be parsed
    #[error("Malformed VDF proof: {0}")]
    MalformedProof(String),

    /// Worker thread disappeared without reporting an outcome
    #[error("VDF worker for job {0} vanished")]
    WorkerVanished(JobId),
}
