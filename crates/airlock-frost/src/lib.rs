//! Airlock FROST - guardian threshold signatures
//!
//! FROST (Flexible Round-Optimized Schnorr Threshold) signing over
//! ristretto255 for the fixed guardian set. Key shares come from a one-shot
//! distributed key generation at boot; signing is the standard two-round
//! protocol (nonce commitments, then binding-factor-weighted shares)
//! aggregated into a single 64-byte Schnorr signature `(R, z)`.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub mod dkg;
pub mod error;
pub mod signing;

pub use dkg::{run_dkg, GuardianKeyring};
pub use error::{Result, ThresholdError};
pub use signing::{sign, verify};

/// Serialized group verifying key (32 bytes for ristretto255)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVerifyingKey(pub Vec<u8>);

impl GroupVerifyingKey {
    /// Get the key as hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// One guardian slot's secret signing material
#[derive(Clone, Serialize, Deserialize)]
pub struct SlotShare {
    /// Guardian slot index (0-based)
    pub slot: u8,

    /// Serialized FROST key package
    pub data: Vec<u8>,
}

impl std::fmt::Debug for SlotShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotShare")
            .field("slot", &self.slot)
            .field("data", &"[REDACTED]")
            .finish()
    }
}

impl Zeroize for SlotShare {
    fn zeroize(&mut self) {
        self.data.zeroize();
    }
}

impl Drop for SlotShare {
    fn drop(&mut self) {
        self.zeroize();
    }
}
