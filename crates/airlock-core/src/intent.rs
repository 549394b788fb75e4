//! Transaction intents and fingerprint derivation

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::types::{ChainTag, Fingerprint};

/// Domain separator for fingerprint derivation
const FINGERPRINT_DOMAIN: &[u8] = b"airlock:fingerprint:v1\0";

/// An immutable candidate on-chain transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionIntent {
    /// Caller identity (20-byte address, hex encoded on the wire)
    pub sender: Vec<u8>,

    /// Destination identity
    pub destination: Vec<u8>,

    /// Transferred value in the chain's base unit
    pub value: u128,

    /// Opaque call payload
    pub payload: Vec<u8>,

    /// Source chain
    pub source_chain: ChainTag,

    /// Optional destination chain for cross-chain intents
    pub dest_chain: Option<ChainTag>,
}

impl TransactionIntent {
    /// Structural validation applied at the boundary
    ///
    /// An empty or all-zero destination is never routable and is rejected
    /// before any state is created.
    pub fn validate(&self) -> Result<(), Error> {
        if self.destination.is_empty() || self.destination.iter().all(|b| *b == 0) {
            return Err(Error::InvalidIntent("empty or zero destination".into()));
        }
        if self.sender.is_empty() {
            return Err(Error::InvalidIntent("empty sender".into()));
        }
        Ok(())
    }

    /// Derive the transaction fingerprint
    ///
    /// Deterministic over (destination, payload, value, source chain, nonce).
    /// The nonce is supplied by the caller's monotone counter so resubmission
    /// of an identical intent yields a fresh proposal key.
    pub fn fingerprint(&self, nonce: u64) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN);
        hasher.update((self.destination.len() as u64).to_le_bytes());
        hasher.update(&self.destination);
        hasher.update((self.payload.len() as u64).to_le_bytes());
        hasher.update(&self.payload);
        hasher.update(self.value.to_le_bytes());
        hasher.update(self.source_chain.as_u32().to_le_bytes());
        hasher.update(nonce.to_le_bytes());
        Fingerprint::new(hasher.finalize().into())
    }
}

/// Monotone nonce source for fingerprint derivation
#[derive(Debug, Default)]
pub struct FingerprintCounter(AtomicU64);

impl FingerprintCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Take the next nonce
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
