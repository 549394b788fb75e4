//! Core type aliases and newtypes

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Transaction fingerprint - deterministic identifier of an intent (32 bytes)
///
/// Primary key of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex_bytes_32")] pub [u8; 32]);

impl Fingerprint {
    /// Create a new Fingerprint from bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the bytes of the fingerprint
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Short display format (first 4 bytes as hex)
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Guardian slot index (0..N-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuardianSlot(pub u8);

impl GuardianSlot {
    /// Create a slot index, validating it against the deployment's
    /// configured guardian count
    ///
    /// The count is a configuration option, not a constant, so boundary
    /// validation of untrusted input must use the running deployment's
    /// value.
    pub fn new(index: u8, guardian_count: u8) -> Result<Self, Error> {
        if guardian_count == 0 || index >= guardian_count {
            return Err(Error::InvalidSlot {
                slot: index,
                max: guardian_count.saturating_sub(1),
            });
        }
        Ok(Self(index))
    }

    /// Get the raw index
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Iterate over a roster's slots in canonical order
    pub fn all(guardian_count: u8) -> impl Iterator<Item = GuardianSlot> {
        (0..guardian_count).map(GuardianSlot)
    }
}

/// A guardian's vote on a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    /// Reject the transaction
    Reject = 0,
    /// Approve the transaction
    Approve = 1,
    /// Abstain from the decision
    Abstain = 2,
}

impl VoteChoice {
    /// Numeric encoding used inside commitments
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Decode from the commitment vote domain
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Reject),
            1 => Some(Self::Approve),
            2 => Some(Self::Abstain),
            _ => None,
        }
    }
}

/// Risk verdict emitted by the scorer alongside the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Suspicious,
    Dangerous,
}

/// A bounded risk score in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore(f64);

impl RiskScore {
    /// Create a score, clamping into [0, 100]
    pub fn new(score: f64) -> Self {
        Self(score.clamp(0.0, 100.0))
    }

    /// Get the numeric value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether this score triggers the VDF path at the given threshold
    pub fn is_flagged(&self, flag_threshold: f64) -> bool {
        self.0 >= flag_threshold
    }
}

/// Chain identifier for multi-chain intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainTag(pub u32);

impl ChainTag {
    /// Ethereum Mainnet
    pub const ETHEREUM: ChainTag = ChainTag(1);
    /// Ethereum Sepolia Testnet
    pub const SEPOLIA: ChainTag = ChainTag(11155111);
    /// Arbitrum One
    pub const ARBITRUM: ChainTag = ChainTag(42161);
    /// Base
    pub const BASE: ChainTag = ChainTag(8453);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Serde helper for 32-byte arrays as hex strings
pub mod hex_bytes_32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(bytes)
    }
}
