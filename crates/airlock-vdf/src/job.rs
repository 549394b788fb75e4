//! VDF job state shared between the engine and worker threads

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use airlock_core::envelope::VdfProofBytes;

/// Identifier of a VDF job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vdf-{}", self.0)
    }
}

/// Lifecycle status of a VDF job
///
/// Transitions are monotone except that any non-terminal state may jump to
/// `Bypassed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, worker not yet running
    Pending = 0,
    /// Worker executing the squaring loop
    Computing = 1,
    /// Proof available
    Ready = 2,
    /// Computation failed; fatal for this job only
    Failed = 3,
    /// Abandoned at a checkpoint after a bypass request
    Bypassed = 4,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Bypassed)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Pending,
            1 => Self::Computing,
            2 => Self::Ready,
            3 => Self::Failed,
            _ => Self::Bypassed,
        }
    }
}

/// Terminal result published by a worker
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// Proof computed, in wire form
    Ready(VdfProofBytes),
    /// Bypass acknowledged; awaiters receive the zero-proof
    Bypassed,
    /// Computation failed
    Failed(String),
}

/// Requested abandonment of a running job
///
/// Bypass yields the zero-proof; cancellation is a failure. The first
/// request wins and the worker honors it at its next checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonKind {
    Bypass,
    Cancel,
}

impl AbandonKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Bypass),
            2 => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Non-blocking snapshot returned by `poll`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    /// Percentage of total work (evaluation plus witness pass) completed
    pub progress: u8,
    /// Remaining wall-clock estimate from the measured squaring rate
    pub eta_seconds: Option<u64>,
    /// Present once status is `Ready`
    pub proof: Option<VdfProofBytes>,
}

/// State shared between the engine handle and the worker thread
#[derive(Debug)]
pub struct JobShared {
    pub id: JobId,
    /// Requested iterations T
    pub iterations: u64,
    status: AtomicU8,
    /// Completed work units out of `2 * iterations`
    work_done: AtomicU64,
    /// 0 = run, 1 = bypass requested, 2 = cancel requested
    abandon: AtomicU8,
    pub started: Instant,
}

impl JobShared {
    pub fn new(id: JobId, iterations: u64) -> Self {
        Self {
            id,
            iterations,
            status: AtomicU8::new(JobStatus::Pending as u8),
            work_done: AtomicU64::new(0),
            abandon: AtomicU8::new(0),
            started: Instant::now(),
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Set status; terminal states are sticky
    pub fn set_status(&self, status: JobStatus) {
        let _ = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if JobStatus::from_u8(current).is_terminal() {
                    None
                } else {
                    Some(status as u8)
                }
            });
    }

    /// Request abandonment; first request wins, observed by the worker
    /// at its next checkpoint
    pub fn request_abandon(&self, kind: AbandonKind) {
        let _ = self.abandon.compare_exchange(
            0,
            kind as u8 + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn abandon_requested(&self) -> Option<AbandonKind> {
        AbandonKind::from_u8(self.abandon.load(Ordering::Acquire))
    }

    /// Record completed work units (evaluation pass counts iterations,
    /// witness pass counts `iterations + done`)
    pub fn record_work(&self, done: u64) {
        self.work_done.store(done, Ordering::Release);
    }

    /// Progress in percent over both passes
    pub fn progress(&self) -> u8 {
        let total = self.iterations.saturating_mul(2);
        if total == 0 {
            return 100;
        }
        let done = self.work_done.load(Ordering::Acquire).min(total);
        ((done as u128 * 100) / total as u128) as u8
    }

    /// Remaining seconds estimated from the rate so far
    pub fn eta_seconds(&self) -> Option<u64> {
        let done = self.work_done.load(Ordering::Acquire);
        if done == 0 || self.status().is_terminal() {
            return None;
        }
        let total = self.iterations.saturating_mul(2);
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = done as f64 / elapsed.max(1e-6);
        Some(((total - done.min(total)) as f64 / rate).ceil() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_sticky() {
        let shared = JobShared::new(JobId(1), 100);
        shared.set_status(JobStatus::Computing);
        shared.set_status(JobStatus::Bypassed);
        assert_eq!(shared.status(), JobStatus::Bypassed);

        // A later Ready must not overwrite the bypass
        shared.set_status(JobStatus::Ready);
        assert_eq!(shared.status(), JobStatus::Bypassed);
    }

    #[test]
    fn test_progress_spans_both_passes() {
        let shared = JobShared::new(JobId(2), 100);
        assert_eq!(shared.progress(), 0);
        shared.record_work(100);
        assert_eq!(shared.progress(), 50);
        shared.record_work(200);
        assert_eq!(shared.progress(), 100);
        shared.record_work(500);
        assert_eq!(shared.progress(), 100);
    }

    #[test]
    fn test_first_abandon_request_wins() {
        let shared = JobShared::new(JobId(3), 100);
        assert_eq!(shared.abandon_requested(), None);
        shared.request_abandon(AbandonKind::Bypass);
        shared.request_abandon(AbandonKind::Cancel);
        assert_eq!(shared.abandon_requested(), Some(AbandonKind::Bypass));
    }
}
