//! The airlock state machine
//!
//! Realizes the end-to-end lifecycle of one transaction intent:
//! pre-flight policy checks, risk scoring, proposal open, optional VDF
//! arm, then a three-way race between voting resolution, VDF
//! completion, and the proposal deadline. Exactly one terminal outcome
//! is produced per intent.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use airlock_core::envelope::{Envelope, OutcomeTag, ThresholdSignature, VdfProofBytes};
use airlock_core::intent::{FingerprintCounter, TransactionIntent};
use airlock_core::types::Fingerprint;
use airlock_core::AirlockConfig;
use airlock_vdf::{JobId, VdfEngine};
use airlock_vote::BallotOutcome;

use crate::error::{DaemonError, Result};
use crate::executor::{ExecutionReceipt, TransactionExecutor};
use crate::guardian::GuardianHub;
use crate::policy::PolicyStore;
use crate::progress::{ProgressEvent, ProgressSender};
use crate::scorer::RiskScorer;
use crate::store::{ProposalStore, VoteResolution};

/// Interval between best-effort progress emissions while racing
const PROGRESS_TICK_MS: u64 = 500;

/// Why an intent was blocked before scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Sender on the blacklist snapshot
    Blacklisted,
    /// Protocol paused
    Paused,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blacklisted => "sender blacklisted",
            Self::Paused => "protocol paused",
        }
    }
}

/// Terminal outcome of one intent
#[derive(Debug)]
pub enum AirlockOutcome {
    /// Approval envelope emitted and executed
    Approved {
        envelope: Envelope,
        receipt: ExecutionReceipt,
    },
    /// Rejection envelope emitted; the executor blocked it
    Rejected {
        envelope: Envelope,
        receipt: ExecutionReceipt,
    },
    /// Pre-flight policy block; no proposal was opened
    Blocked { reason: BlockReason },
    /// Deadline passed without a voting threshold or VDF completion
    Expired,
    /// Fatal failure for this intent
    Failed { reason: String },
    /// Cancelled via the intent-scoped token
    Cancelled,
}

/// Cancel side of an intent-scoped cancellation pair
#[derive(Debug, Clone)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Wait side of an intent-scoped cancellation pair
#[derive(Debug)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// Resolve once cancellation is requested; pends forever if the
    /// handle is dropped without cancelling
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected (handle, token) pair
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

/// The airlock orchestrator
pub struct Airlock {
    config: AirlockConfig,
    store: Arc<ProposalStore>,
    hub: Arc<GuardianHub>,
    vdf: Arc<VdfEngine>,
    scorer: Arc<dyn RiskScorer>,
    executor: Arc<dyn TransactionExecutor>,
    policy: Arc<PolicyStore>,
    nonces: FingerprintCounter,
    progress: ProgressSender,
}

impl Airlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AirlockConfig,
        store: Arc<ProposalStore>,
        hub: Arc<GuardianHub>,
        vdf: Arc<VdfEngine>,
        scorer: Arc<dyn RiskScorer>,
        executor: Arc<dyn TransactionExecutor>,
        policy: Arc<PolicyStore>,
        progress: ProgressSender,
    ) -> Self {
        Self {
            config,
            store,
            hub,
            vdf,
            scorer,
            executor,
            policy,
            nonces: FingerprintCounter::new(),
            progress,
        }
    }

    /// Validate an intent and assign its proposal fingerprint
    ///
    /// Boundary errors (`InvalidIntent`) surface here, before any state
    /// is created.
    pub fn prepare(&self, intent: &TransactionIntent) -> Result<Fingerprint> {
        intent
            .validate()
            .map_err(|e| DaemonError::InvalidIntent(e.to_string()))?;
        Ok(intent.fingerprint(self.nonces.next()))
    }

    /// Process an intent to its terminal outcome
    pub async fn process(&self, intent: TransactionIntent) -> Result<AirlockOutcome> {
        let (_handle, token) = cancel_pair();
        self.process_with_cancel(intent, token).await
    }

    /// Process an intent with an intent-scoped cancellation token
    ///
    /// Cancellation bypasses any owned VDF job and yields the
    /// `Cancelled` terminal outcome.
    pub async fn process_with_cancel(
        &self,
        intent: TransactionIntent,
        cancel: CancelToken,
    ) -> Result<AirlockOutcome> {
        let fingerprint = self.prepare(&intent)?;
        self.process_prepared(intent, fingerprint, cancel).await
    }

    /// Drive a prepared intent through the airlock
    pub async fn process_prepared(
        &self,
        intent: TransactionIntent,
        fingerprint: Fingerprint,
        mut cancel: CancelToken,
    ) -> Result<AirlockOutcome> {
        self.progress.emit(ProgressEvent::Submitted { fingerprint });
        info!(fingerprint = %fingerprint.short(), value = intent.value, "intent submitted");

        // Pre-flight: policy snapshot taken once, before any state exists
        let policy = self.policy.snapshot().await;
        if policy.is_paused() {
            return Ok(self.block(fingerprint, BlockReason::Paused));
        }
        if policy.is_blacklisted(&intent.sender) {
            return Ok(self.block(fingerprint, BlockReason::Blacklisted));
        }

        // Scoring: fail-open on score, never on voting
        self.progress.emit(ProgressEvent::Scoring { fingerprint });
        let flagged = self.score_intent(&intent, fingerprint).await;

        // Queued: open the proposal; arm the VDF when flagged
        let now = unix_now();
        self.store
            .open(fingerprint, now, self.config.proposal_deadline_secs)
            .await?;
        let mut resolution_rx = self.store.subscribe(fingerprint).await?;

        let vdf_job = if flagged {
            let job = self
                .vdf
                .request(fingerprint.as_bytes(), self.config.vdf_iterations)
                .await?;
            self.store.set_vdf_job(fingerprint, job).await?;
            Some(job)
        } else {
            None
        };

        // A resolution may already exist if guardians raced ahead of the
        // subscription
        let early = resolution_rx.borrow_and_update().clone();
        if let Some(resolution) = early {
            return self.settle_voting(fingerprint, vdf_job, resolution).await;
        }

        // Racing: first of voting-resolved, vdf-ready, deadline, cancel
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.proposal_deadline_secs);
        let vdf_engine = Arc::clone(&self.vdf);
        let vdf_wait = async {
            match vdf_job {
                Some(job) => vdf_engine.await_job(job).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(vdf_wait);
        let mut vdf_settled = false;

        let mut ticker = tokio::time::interval(Duration::from_millis(PROGRESS_TICK_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Voting beats the VDF when both are observable in the
                // same poll window
                biased;

                _ = cancel.cancelled() => {
                    self.bypass_job(vdf_job).await;
                    let _ = self.store.expire(fingerprint).await;
                    self.progress.emit(ProgressEvent::Complete {
                        fingerprint,
                        outcome: "cancelled".into(),
                    });
                    info!(fingerprint = %fingerprint.short(), "intent cancelled");
                    return Ok(AirlockOutcome::Cancelled);
                }

                changed = resolution_rx.changed() => {
                    if changed.is_err() {
                        return Ok(self.fail(fingerprint, "proposal store dropped".into()));
                    }
                    let resolution = resolution_rx.borrow_and_update().clone();
                    if let Some(resolution) = resolution {
                        return self.settle_voting(fingerprint, vdf_job, resolution).await;
                    }
                }

                vdf_result = &mut vdf_wait, if vdf_job.is_some() && !vdf_settled => {
                    vdf_settled = true;
                    match vdf_result {
                        Ok(proof) if !proof.is_zero() => {
                            return self.settle_vdf(fingerprint, proof, &mut resolution_rx).await;
                        }
                        Ok(_zero) => {
                            // Bypassed elsewhere; the voting arm delivers
                            // the terminal state
                        }
                        Err(e) => {
                            // Voting unresolved at the moment of the
                            // error, or the resolution arm would have
                            // fired first: fatal for this intent
                            warn!(fingerprint = %fingerprint.short(), error = %e, "VDF failed with voting unresolved");
                            let _ = self.store.expire(fingerprint).await;
                            return Ok(self.fail(fingerprint, format!("VDF failure: {e}")));
                        }
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    self.bypass_job(vdf_job).await;
                    let _ = self.store.expire(fingerprint).await;
                    self.progress.emit(ProgressEvent::Complete {
                        fingerprint,
                        outcome: "expired".into(),
                    });
                    info!(fingerprint = %fingerprint.short(), "proposal deadline fired");
                    return Ok(AirlockOutcome::Expired);
                }

                _ = ticker.tick() => {
                    self.emit_pending(fingerprint, vdf_job).await;
                }
            }
        }
    }

    /// Invoke the scorer under its timeout; degrade to unflagged on any
    /// failure
    async fn score_intent(&self, intent: &TransactionIntent, fingerprint: Fingerprint) -> bool {
        let timeout = Duration::from_millis(self.config.scorer_timeout_ms);
        match tokio::time::timeout(timeout, self.scorer.analyze(intent)).await {
            Ok(Ok(assessment)) => {
                let flagged = assessment.score.is_flagged(self.config.flag_threshold);
                let score = assessment.score.value();
                if flagged {
                    self.progress
                        .emit(ProgressEvent::Flagged { fingerprint, score });
                    info!(fingerprint = %fingerprint.short(), score, "intent flagged");
                } else {
                    self.progress
                        .emit(ProgressEvent::Unflagged { fingerprint, score });
                }
                flagged
            }
            Ok(Err(e)) => {
                warn!(fingerprint = %fingerprint.short(), error = %e, "scorer error; degrading to unflagged");
                self.progress.emit(ProgressEvent::ScorerDegraded {
                    fingerprint,
                    reason: e.to_string(),
                });
                false
            }
            Err(_) => {
                warn!(fingerprint = %fingerprint.short(), "scorer timeout; degrading to unflagged");
                self.progress.emit(ProgressEvent::ScorerDegraded {
                    fingerprint,
                    reason: "scorer timeout".into(),
                });
                false
            }
        }
    }

    /// Voting resolved first: bypass the time-lock, then emit the
    /// zero-proof envelope carrying the voted outcome
    async fn settle_voting(
        &self,
        fingerprint: Fingerprint,
        vdf_job: Option<JobId>,
        resolution: VoteResolution,
    ) -> Result<AirlockOutcome> {
        // Bypass is issued before the envelope is emitted
        self.bypass_job(vdf_job).await;

        match resolution {
            VoteResolution::Decided { outcome, signature } => {
                let outcome_tag = match outcome {
                    BallotOutcome::Approved => OutcomeTag::Approved,
                    BallotOutcome::Rejected => OutcomeTag::Rejected,
                };
                let (envelope, receipt) = self
                    .emit_envelope(fingerprint, VdfProofBytes::zero(), signature, outcome_tag)
                    .await?;
                Ok(match outcome {
                    BallotOutcome::Approved => AirlockOutcome::Approved { envelope, receipt },
                    BallotOutcome::Rejected => AirlockOutcome::Rejected { envelope, receipt },
                })
            }
            VoteResolution::Expired => {
                self.progress.emit(ProgressEvent::Complete {
                    fingerprint,
                    outcome: "expired".into(),
                });
                Ok(AirlockOutcome::Expired)
            }
            VoteResolution::SigningFailed { reason } => {
                Ok(self.fail(fingerprint, format!("signature assembly failed: {reason}")))
            }
        }
    }

    /// VDF completed first with voting still open: emit the full-proof
    /// envelope signed over the delayed-approved tag
    async fn settle_vdf(
        &self,
        fingerprint: Fingerprint,
        proof: VdfProofBytes,
        resolution_rx: &mut watch::Receiver<Option<VoteResolution>>,
    ) -> Result<AirlockOutcome> {
        let signature = match self.hub.sign_outcome(fingerprint, OutcomeTag::DelayedApproved) {
            Ok(signature) => signature,
            Err(e) => {
                // Signature assembly errors are always fatal
                let _ = self.store.expire(fingerprint).await;
                return Ok(self.fail(fingerprint, format!("signature assembly failed: {e}")));
            }
        };

        // Freeze the proposal. Losing this write means voting crossed its
        // threshold in the same window; the documented tie-break hands
        // the outcome to voting.
        match self
            .store
            .finalize(fingerprint, BallotOutcome::Approved, signature)
            .await
        {
            Ok(()) => {}
            Err(DaemonError::AlreadyFinalized(_)) => {
                let resolution = resolution_rx.borrow_and_update().clone();
                if let Some(resolution) = resolution {
                    return self.settle_voting(fingerprint, None, resolution).await;
                }
                return Ok(self.fail(fingerprint, "proposal finalized without resolution".into()));
            }
            Err(e) => return Err(e),
        }

        info!(fingerprint = %fingerprint.short(), "time-lock completed before voting resolved");
        let (envelope, receipt) = self
            .emit_envelope(fingerprint, proof, signature, OutcomeTag::DelayedApproved)
            .await?;
        Ok(AirlockOutcome::Approved { envelope, receipt })
    }

    /// Assemble the envelope and hand it to the executor exactly once
    async fn emit_envelope(
        &self,
        fingerprint: Fingerprint,
        vdf_proof: VdfProofBytes,
        threshold_signature: ThresholdSignature,
        outcome_tag: OutcomeTag,
    ) -> Result<(Envelope, ExecutionReceipt)> {
        let envelope = Envelope {
            fingerprint,
            vdf_proof,
            threshold_signature,
            outcome_tag,
        };
        self.progress.emit(ProgressEvent::Ready { fingerprint });
        self.progress.emit(ProgressEvent::Executing { fingerprint });

        let receipt = self
            .executor
            .submit(&envelope)
            .await
            .map_err(|e| DaemonError::Executor(e.to_string()))?;

        self.progress.emit(ProgressEvent::Complete {
            fingerprint,
            outcome: format!("{:?}", outcome_tag),
        });
        info!(
            fingerprint = %fingerprint.short(),
            ?outcome_tag,
            accepted = receipt.accepted,
            "envelope emitted"
        );
        Ok((envelope, receipt))
    }

    fn block(&self, fingerprint: Fingerprint, reason: BlockReason) -> AirlockOutcome {
        info!(fingerprint = %fingerprint.short(), reason = reason.as_str(), "intent blocked pre-flight");
        self.progress.emit(ProgressEvent::Complete {
            fingerprint,
            outcome: format!("blocked: {}", reason.as_str()),
        });
        AirlockOutcome::Blocked { reason }
    }

    fn fail(&self, fingerprint: Fingerprint, reason: String) -> AirlockOutcome {
        warn!(fingerprint = %fingerprint.short(), %reason, "intent failed");
        self.progress.emit(ProgressEvent::Failed {
            fingerprint,
            reason: reason.clone(),
        });
        AirlockOutcome::Failed { reason }
    }

    async fn bypass_job(&self, job: Option<JobId>) {
        if let Some(job) = job {
            if let Err(e) = self.vdf.bypass(job).await {
                warn!(%job, error = %e, "bypass failed");
            }
        }
    }

    /// Best-effort progress while racing
    async fn emit_pending(&self, fingerprint: Fingerprint, vdf_job: Option<JobId>) {
        if let Ok(tally) = self.store.tally(fingerprint).await {
            self.progress
                .emit(ProgressEvent::VotingPending { fingerprint, tally });
        }
        if let Some(job) = vdf_job {
            if let Ok(snapshot) = self.vdf.poll(job).await {
                self.progress.emit(ProgressEvent::VdfPending {
                    fingerprint,
                    progress: snapshot.progress,
                    eta_seconds: snapshot.eta_seconds,
                });
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_pair_signals() {
        let (handle, mut token) = cancel_pair();
        handle.cancel();
        // Resolves promptly once cancelled
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, mut token) = cancel_pair();
        drop(handle);
        let waited =
            tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(waited.is_err());
    }
}
