//! Error types for Airlock core operations

use thiserror::Error;

/// Result type alias using the core error type
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur in core type handling
#[derive(Debug, Error)]
pub enum Error {
    /// Intent failed structural validation
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    /// Guardian slot index out of range
    #[error("Invalid guardian slot {slot} (max {max})")]
    InvalidSlot { slot: u8, max: u8 },

    /// Envelope field has the wrong shape
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
