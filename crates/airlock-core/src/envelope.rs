//! The execution envelope - the terminal artifact of the airlock

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{hex_bytes_32, Fingerprint};

/// Signed outcome tag carried by an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeTag {
    /// Approved by guardian vote
    Approved,
    /// Rejected by guardian vote; the executor must block
    Rejected,
    /// Approved by completed time-lock while voting remained open
    DelayedApproved,
}

impl OutcomeTag {
    /// Canonical byte encoding used as threshold-signature message suffix
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Approved => b"approved",
            Self::Rejected => b"rejected",
            Self::DelayedApproved => b"delayed-approved",
        }
    }
}

/// Wesolowski proof in wire form
///
/// The zero-proof (all-zero output, empty witness, zero iterations) marks an
/// envelope whose approval rests entirely on the threshold signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdfProofBytes {
    /// VDF output y (32-byte digest of the group element)
    #[serde(with = "hex_bytes_32")]
    pub output: [u8; 32],

    /// Wesolowski witness pi (variable-length big-endian group element)
    #[serde(with = "hex::serde")]
    pub witness: Vec<u8>,

    /// Iterations actually performed
    pub iterations: u64,
}

impl VdfProofBytes {
    /// The distinguished zero-proof
    pub fn zero() -> Self {
        Self {
            output: [0u8; 32],
            witness: Vec::new(),
            iterations: 0,
        }
    }

    /// Whether this is the distinguished zero-proof
    pub fn is_zero(&self) -> bool {
        self.iterations == 0 && self.witness.is_empty() && self.output == [0u8; 32]
    }
}

/// Aggregated threshold Schnorr signature over the envelope message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSignature {
    /// Group commitment R
    #[serde(with = "hex_bytes_32")]
    pub r: [u8; 32],

    /// Aggregated response z
    #[serde(with = "hex_bytes_32")]
    pub z: [u8; 32],
}

impl ThresholdSignature {
    /// Split a 64-byte serialized Schnorr signature into (R, z)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 64 {
            return Err(Error::MalformedEnvelope(format!(
                "threshold signature must be 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut z = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        z.copy_from_slice(&bytes[32..]);
        Ok(Self { r, z })
    }

    /// Rejoin into the 64-byte wire form
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.z);
        out
    }
}

/// The final artifact of the airlock, consumed once by the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Proposal primary key
    pub fingerprint: Fingerprint,

    /// VDF proof, possibly the zero-proof
    pub vdf_proof: VdfProofBytes,

    /// Threshold signature over `fingerprint || outcome_tag`
    pub threshold_signature: ThresholdSignature,

    /// The signed outcome
    pub outcome_tag: OutcomeTag,
}

impl Envelope {
    /// The message the threshold signature commits to
    ///
    /// Includes the fingerprint so a signature cannot be replayed across
    /// proposals, and the outcome tag so approval and rejection envelopes
    /// are never interchangeable.
    pub fn signed_message(fingerprint: &Fingerprint, outcome: OutcomeTag) -> Vec<u8> {
        let mut msg = Vec::with_capacity(32 + 16);
        msg.extend_from_slice(b"airlock:envelope:v1\0");
        msg.extend_from_slice(fingerprint.as_bytes());
        msg.extend_from_slice(outcome.as_bytes());
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_proof_shape() {
        let zero = VdfProofBytes::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.iterations, 0);

        let nonzero = VdfProofBytes {
            output: [1u8; 32],
            witness: vec![2u8; 16],
            iterations: 1000,
        };
        assert!(!nonzero.is_zero());
    }

    #[test]
    fn test_signature_split_roundtrip() {
        let mut bytes = [0u8; 64];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let sig = ThresholdSignature::from_bytes(&bytes).unwrap();
        assert_eq!(sig.to_bytes(), bytes);
        assert!(ThresholdSignature::from_bytes(&bytes[..63]).is_err());
    }

    #[test]
    fn test_signed_message_binds_outcome() {
        let fp = Fingerprint::new([7u8; 32]);
        let approved = Envelope::signed_message(&fp, OutcomeTag::Approved);
        let rejected = Envelope::signed_message(&fp, OutcomeTag::Rejected);
        let delayed = Envelope::signed_message(&fp, OutcomeTag::DelayedApproved);
        assert_ne!(approved, rejected);
        assert_ne!(approved, delayed);

        let other_fp = Fingerprint::new([8u8; 32]);
        assert_ne!(approved, Envelope::signed_message(&other_fp, OutcomeTag::Approved));
    }

    #[test]
    fn test_envelope_json_roundtrip() {
        let envelope = Envelope {
            fingerprint: Fingerprint::new([3u8; 32]),
            vdf_proof: VdfProofBytes::zero(),
            threshold_signature: ThresholdSignature {
                r: [4u8; 32],
                z: [5u8; 32],
            },
            outcome_tag: OutcomeTag::Approved,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fingerprint, envelope.fingerprint);
        assert_eq!(back.outcome_tag, envelope.outcome_tag);
        assert!(back.vdf_proof.is_zero());
    }
}
