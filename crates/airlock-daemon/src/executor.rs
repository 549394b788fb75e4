//! Transaction executor adapter
//!
//! The chain-facing side of the airlock. The core hands over a finished
//! envelope exactly once; contract binding and RPC details live behind
//! the trait. The in-memory executor validates the envelope the way the
//! on-chain verifier would: a zero VDF proof is accepted only under a
//! valid threshold signature, a nonzero proof must verify against the
//! fingerprint, and a rejection envelope always blocks.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, warn};

use airlock_core::envelope::{Envelope, OutcomeTag};
use airlock_core::types::Fingerprint;
use airlock_frost::GroupVerifyingKey;
use airlock_vdf::VdfEngine;

/// Receipt returned by the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Whether the transaction was released for execution
    pub accepted: bool,

    /// Reason when not accepted
    pub reason: Option<String>,

    /// Submission hash assigned by the executor
    pub submission_hash: Fingerprint,
}

/// Capability interface to the on-chain executor
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Submit a finished envelope; consumed once
    async fn submit(&self, envelope: &Envelope) -> anyhow::Result<ExecutionReceipt>;
}

/// Envelope validation shared by executor implementations
///
/// Enforces the zero-proof contract: an envelope with the zero proof must
/// carry a valid threshold signature over its outcome tag, and an
/// envelope with a real proof must verify against the fingerprint
/// challenge at the configured iteration count.
pub fn validate_envelope(
    envelope: &Envelope,
    group_public: &GroupVerifyingKey,
    vdf: &VdfEngine,
    vdf_iterations: u64,
) -> Result<(), String> {
    let message = Envelope::signed_message(&envelope.fingerprint, envelope.outcome_tag);
    if !airlock_frost::verify(&message, group_public, &envelope.threshold_signature) {
        return Err("threshold signature invalid".into());
    }

    if envelope.vdf_proof.is_zero() {
        // Zero proof rides entirely on the signature, which must attest a
        // voted outcome rather than a delay
        if envelope.outcome_tag == OutcomeTag::DelayedApproved {
            return Err("delayed-approved envelope requires a real VDF proof".into());
        }
        return Ok(());
    }

    if !vdf.verify(
        envelope.fingerprint.as_bytes(),
        vdf_iterations,
        &envelope.vdf_proof,
    ) {
        return Err("VDF proof invalid".into());
    }
    Ok(())
}

/// In-memory executor for tests and local runs
pub struct MockExecutor {
    group_public: GroupVerifyingKey,
    vdf: Arc<VdfEngine>,
    vdf_iterations: u64,
    /// Envelopes accepted for execution, in submission order
    pub executed: Mutex<Vec<Envelope>>,
    /// Envelopes blocked, with the blocking reason
    pub blocked: Mutex<Vec<(Envelope, String)>>,
}

impl MockExecutor {
    pub fn new(group_public: GroupVerifyingKey, vdf: Arc<VdfEngine>, vdf_iterations: u64) -> Self {
        Self {
            group_public,
            vdf,
            vdf_iterations,
            executed: Mutex::new(Vec::new()),
            blocked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TransactionExecutor for MockExecutor {
    async fn submit(&self, envelope: &Envelope) -> anyhow::Result<ExecutionReceipt> {
        let submission_hash = submission_hash(envelope);

        if let Err(reason) =
            validate_envelope(envelope, &self.group_public, &self.vdf, self.vdf_iterations)
        {
            warn!(fingerprint = %envelope.fingerprint.short(), %reason, "envelope rejected");
            self.blocked
                .lock()
                .await
                .push((envelope.clone(), reason.clone()));
            return Ok(ExecutionReceipt {
                accepted: false,
                reason: Some(reason),
                submission_hash,
            });
        }

        if envelope.outcome_tag == OutcomeTag::Rejected {
            info!(fingerprint = %envelope.fingerprint.short(), "rejection envelope; blocking");
            self.blocked
                .lock()
                .await
                .push((envelope.clone(), "guardian rejection".into()));
            return Ok(ExecutionReceipt {
                accepted: false,
                reason: Some("guardian rejection".into()),
                submission_hash,
            });
        }

        info!(fingerprint = %envelope.fingerprint.short(), outcome = ?envelope.outcome_tag, "envelope executed");
        self.executed.lock().await.push(envelope.clone());
        Ok(ExecutionReceipt {
            accepted: true,
            reason: None,
            submission_hash,
        })
    }
}

fn submission_hash(envelope: &Envelope) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(b"airlock:submission:v1\0");
    hasher.update(envelope.fingerprint.as_bytes());
    hasher.update(envelope.outcome_tag.as_bytes());
    Fingerprint::new(hasher.finalize().into())
}
