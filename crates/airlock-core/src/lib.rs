//! Airlock Core - Shared types, intent fingerprinting, and envelope format
//!
//! This crate provides the foundational types for the Airlock transaction
//! gate: intents, fingerprints, risk scores, guardian slots, votes, and the
//! execution envelope consumed by the on-chain executor.

pub mod config;
pub mod envelope;
pub mod error;
pub mod intent;
pub mod policy;
pub mod types;

pub use config::AirlockConfig;
pub use envelope::{Envelope, OutcomeTag, ThresholdSignature, VdfProofBytes};
pub use error::{Error, Result};
pub use intent::{FingerprintCounter, TransactionIntent};
pub use policy::PolicySnapshot;
pub use types::{ChainTag, Fingerprint, GuardianSlot, RiskScore, Verdict, VoteChoice};

/// Total guardian slots
pub const GUARDIAN_COUNT: u8 = 10;

/// Approvals required to finalize a proposal as approved
pub const APPROVAL_THRESHOLD: u8 = 7;

/// Rejections required to finalize a proposal as rejected
///
/// Derived so that approval and rejection thresholds sum to N+1, making
/// ties impossible.
pub const REJECTION_THRESHOLD: u8 = GUARDIAN_COUNT - APPROVAL_THRESHOLD + 1;

/// Risk score at or above which the VDF path is engaged
pub const FLAG_THRESHOLD: f64 = 50.0;

/// Production VDF iteration count
pub const VDF_ITERATIONS: u64 = 300_000_000;

/// Demo-scale VDF iteration count
pub const VDF_ITERATIONS_DEMO: u64 = 50_000;

/// Default proposal deadline in seconds
pub const PROPOSAL_DEADLINE_SECS: u64 = 300;

/// Default scorer timeout in milliseconds
pub const SCORER_TIMEOUT_MS: u64 = 10_000;

/// VDF progress/bypass checkpoint granularity in squarings
pub const CHECKPOINT_EVERY: u64 = 4096;
