//! Airlock VDF - Wesolowski verifiable delay function
//!
//! Computes and verifies Wesolowski proofs `(y, pi)` with
//! `y = x^{2^T} mod N` over a fixed RSA modulus, and manages running
//! computations as jobs with progress polling and guardian-triggered
//! bypass. The squaring loop is strictly sequential; one dedicated OS
//! thread per active job.

pub mod engine;
pub mod error;
pub mod job;
pub mod wesolowski;

pub use engine::VdfEngine;
pub use error::{Result, VdfError};
pub use job::{JobId, JobSnapshot, JobStatus};
pub use wesolowski::{RsaModulus, VdfProof};

/// Default RSA modulus size in bits
pub const MODULUS_BITS: u64 = 2048;

/// Bit length of the Fiat-Shamir prime `l`
pub const FS_PRIME_BITS: u64 = 128;

/// Miller-Rabin rounds for prime testing
pub const MILLER_RABIN_ROUNDS: u32 = 32;
