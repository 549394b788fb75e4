//! VDF job engine
//!
//! Owns all running jobs. Each job gets a dedicated OS thread for the
//! sequential squaring loop; progress and the bypass flag cross the
//! thread boundary through atomics, and the terminal outcome through a
//! `tokio::sync::watch` channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use airlock_core::envelope::VdfProofBytes;

use crate::error::{Result, VdfError};
use crate::job::{AbandonKind, JobId, JobOutcome, JobShared, JobSnapshot, JobStatus};
use crate::wesolowski::{self, RsaModulus, VdfProof};

struct JobEntry {
    shared: Arc<JobShared>,
    outcome: watch::Receiver<Option<JobOutcome>>,
}

/// The Wesolowski VDF engine
pub struct VdfEngine {
    modulus: Arc<RsaModulus>,
    checkpoint_every: u64,
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
    next_id: AtomicU64,
}

impl VdfEngine {
    /// Create an engine over the given modulus
    pub fn new(modulus: RsaModulus, checkpoint_every: u64) -> Self {
        Self {
            modulus: Arc::new(modulus),
            checkpoint_every: checkpoint_every.max(1),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Begin a sequential computation; returns immediately with a job id
    pub async fn request(&self, challenge: &[u8], iterations: u64) -> Result<JobId> {
        if iterations == 0 {
            return Err(VdfError::IterationsOutOfRange(iterations));
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(JobShared::new(id, iterations));
        let (outcome_tx, outcome_rx) = watch::channel(None);

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                id,
                JobEntry {
                    shared: Arc::clone(&shared),
                    outcome: outcome_rx,
                },
            );
        }

        let modulus = Arc::clone(&self.modulus);
        let challenge = challenge.to_vec();
        let checkpoint_every = self.checkpoint_every;

        // Dedicated thread per job: the squaring loop is CPU-bound and must
        // stay sequential, so it never runs on the async runtime.
        thread::spawn(move || {
            run_worker(shared, modulus, challenge, checkpoint_every, outcome_tx);
        });

        info!(job = %id, iterations, "VDF job requested");
        Ok(id)
    }

    /// Non-blocking status snapshot
    pub async fn poll(&self, id: JobId) -> Result<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id).ok_or(VdfError::UnknownJob(id))?;
        let proof = match &*entry.outcome.borrow() {
            Some(JobOutcome::Ready(proof)) => Some(proof.clone()),
            _ => None,
        };
        Ok(JobSnapshot {
            id,
            status: entry.shared.status(),
            progress: entry.shared.progress(),
            eta_seconds: entry.shared.eta_seconds(),
            proof,
        })
    }

    /// Suspend until the job reaches a terminal state
    ///
    /// `Ready` yields the proof, `Bypassed` yields the zero-proof, and
    /// `Failed` surfaces as an error.
    pub async fn await_job(&self, id: JobId) -> Result<VdfProofBytes> {
        let mut outcome = {
            let jobs = self.jobs.read().await;
            jobs.get(&id).ok_or(VdfError::UnknownJob(id))?.outcome.clone()
        };

        loop {
            if let Some(result) = outcome.borrow_and_update().clone() {
                return match result {
                    JobOutcome::Ready(proof) => Ok(proof),
                    JobOutcome::Bypassed => Ok(VdfProofBytes::zero()),
                    JobOutcome::Failed(reason) => Err(VdfError::JobFailed { job: id, reason }),
                };
            }
            if outcome.changed().await.is_err() {
                return Err(VdfError::WorkerVanished(id));
            }
        }
    }

    /// Request bypass; idempotent, race-free
    ///
    /// The worker abandons the computation at its next checkpoint and
    /// publishes a `Bypassed` outcome, after which `await_job` returns the
    /// zero-proof.
    pub async fn bypass(&self, id: JobId) -> Result<()> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id).ok_or(VdfError::UnknownJob(id))?;
        if entry.shared.status().is_terminal() {
            return Ok(());
        }
        entry.shared.request_abandon(AbandonKind::Bypass);
        debug!(job = %id, "bypass requested");
        Ok(())
    }

    /// Cancel a job outright; distinct from bypass
    ///
    /// The job fails at its next checkpoint and `await_job` surfaces the
    /// failure instead of a zero-proof. Fatal for this job only.
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id).ok_or(VdfError::UnknownJob(id))?;
        if entry.shared.status().is_terminal() {
            return Ok(());
        }
        entry.shared.request_abandon(AbandonKind::Cancel);
        debug!(job = %id, "cancellation requested");
        Ok(())
    }

    /// Stateless proof verification, usable without any job
    pub fn verify(&self, challenge: &[u8], iterations: u64, proof: &VdfProofBytes) -> bool {
        let parsed = match VdfProof::from_wire(proof) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        wesolowski::verify(challenge, iterations, &parsed, &self.modulus)
    }

    /// The modulus this engine runs over
    pub fn modulus(&self) -> &RsaModulus {
        &self.modulus
    }
}

/// Worker body: evaluation pass, Fiat-Shamir prime, witness pass
///
/// The worker is the single writer of terminal states, so a bypass and a
/// cancel arriving together resolve to whichever flag landed first.
fn run_worker(
    shared: Arc<JobShared>,
    modulus: Arc<RsaModulus>,
    challenge: Vec<u8>,
    checkpoint_every: u64,
    outcome_tx: watch::Sender<Option<JobOutcome>>,
) {
    shared.set_status(JobStatus::Computing);
    let iterations = shared.iterations;
    let x = modulus.group_element(&challenge);

    let mut evaluate_observer = {
        let shared = Arc::clone(&shared);
        move |done: u64| {
            shared.record_work(done);
            shared.abandon_requested().is_none()
        }
    };
    let y = wesolowski::evaluate(&x, iterations, &modulus, checkpoint_every, &mut evaluate_observer);

    let Some(y) = y else {
        publish_abandoned(&shared, &outcome_tx, "evaluation");
        return;
    };

    let l = wesolowski::hash_to_prime(&x, &y);

    let mut witness_observer = {
        let shared = Arc::clone(&shared);
        move |done: u64| {
            shared.record_work(iterations + done);
            shared.abandon_requested().is_none()
        }
    };
    let pi = wesolowski::compute_witness(
        &x,
        iterations,
        &l,
        &modulus,
        checkpoint_every,
        &mut witness_observer,
    );

    let Some(pi) = pi else {
        publish_abandoned(&shared, &outcome_tx, "witness pass");
        return;
    };

    let proof = VdfProof {
        output: y,
        witness: pi,
        iterations,
    };
    shared.set_status(JobStatus::Ready);
    if outcome_tx.send(Some(JobOutcome::Ready(proof.to_wire()))).is_err() {
        warn!(job = %shared.id, "VDF outcome dropped: engine gone");
    }
    info!(job = %shared.id, "VDF job ready");
}

fn publish_abandoned(
    shared: &JobShared,
    outcome_tx: &watch::Sender<Option<JobOutcome>>,
    stage: &str,
) {
    match shared.abandon_requested() {
        Some(AbandonKind::Cancel) => {
            shared.set_status(JobStatus::Failed);
            let _ = outcome_tx.send(Some(JobOutcome::Failed("cancelled".into())));
            info!(job = %shared.id, stage, "VDF job cancelled");
        }
        _ => {
            shared.set_status(JobStatus::Bypassed);
            let _ = outcome_tx.send(Some(JobOutcome::Bypassed));
            info!(job = %shared.id, stage, "VDF job bypassed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> VdfEngine {
        VdfEngine::new(RsaModulus::generate(&mut rand::rngs::OsRng, 256), 64)
    }

    #[tokio::test]
    async fn test_request_await_verify() {
        let engine = engine();
        let id = engine.request(b"challenge", 2000).await.unwrap();
        let proof = engine.await_job(id).await.unwrap();
        assert!(!proof.is_zero());
        assert_eq!(proof.iterations, 2000);
        assert!(engine.verify(b"challenge", 2000, &proof));
        assert!(!engine.verify(b"other", 2000, &proof));
    }

    #[tokio::test]
    async fn test_poll_reaches_ready() {
        let engine = engine();
        let id = engine.request(b"poll", 500).await.unwrap();
        let proof = engine.await_job(id).await.unwrap();
        assert!(!proof.is_zero());

        let snapshot = engine.poll(id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Ready);
        assert_eq!(snapshot.progress, 100);
        assert!(snapshot.proof.is_some());
    }

    #[tokio::test]
    async fn test_bypass_yields_zero_proof() {
        let engine = engine();
        // Large enough that bypass lands mid-computation
        let id = engine.request(b"bypass", 50_000_000).await.unwrap();
        engine.bypass(id).await.unwrap();
        let proof = engine.await_job(id).await.unwrap();
        assert!(proof.is_zero());
        assert_eq!(engine.poll(id).await.unwrap().status, JobStatus::Bypassed);
    }

    #[tokio::test]
    async fn test_bypass_is_idempotent() {
        let engine = engine();
        let id = engine.request(b"bypass-twice", 50_000_000).await.unwrap();
        engine.bypass(id).await.unwrap();
        engine.bypass(id).await.unwrap();
        let proof = engine.await_job(id).await.unwrap();
        assert!(proof.is_zero());

        // Bypass after terminal is a no-op, not an error
        engine.bypass(id).await.unwrap();
        assert_eq!(engine.poll(id).await.unwrap().status, JobStatus::Bypassed);
    }

    #[tokio::test]
    async fn test_cancel_is_a_failure_not_a_bypass() {
        let engine = engine();
        let id = engine.request(b"cancel", 50_000_000).await.unwrap();
        engine.cancel(id).await.unwrap();
        assert!(matches!(
            engine.await_job(id).await,
            Err(VdfError::JobFailed { .. })
        ));
        assert_eq!(engine.poll(id).await.unwrap().status, JobStatus::Failed);

        // Bypass after the failure does not resurrect the job
        engine.bypass(id).await.unwrap();
        assert_eq!(engine.poll(id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_job_errors() {
        let engine = engine();
        assert!(matches!(
            engine.poll(JobId(99)).await,
            Err(VdfError::UnknownJob(_))
        ));
        assert!(matches!(
            engine.bypass(JobId(99)).await,
            Err(VdfError::UnknownJob(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_iterations_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.request(b"zero", 0).await,
            Err(VdfError::IterationsOutOfRange(0))
        ));
    }

    #[tokio::test]
    async fn test_jobs_progress_independently() {
        let engine = engine();
        let fast = engine.request(b"fast", 500).await.unwrap();
        let slow = engine.request(b"slow", 50_000_000).await.unwrap();

        let proof = engine.await_job(fast).await.unwrap();
        assert!(!proof.is_zero());

        // The slow job is unaffected by the fast job finishing
        let snapshot = engine.poll(slow).await.unwrap();
        assert!(!snapshot.status.is_terminal() || snapshot.status == JobStatus::Ready);
        engine.bypass(slow).await.unwrap();
        assert!(engine.await_job(slow).await.unwrap().is_zero());
    }
}
