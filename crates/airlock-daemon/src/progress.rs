//! Progress event stream
//!
//! Best-effort observability for a single intent's passage through the
//! airlock. Emission never blocks a state transition: events go through
//! an unbounded channel and a missing receiver is ignored.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use airlock_core::types::Fingerprint;

use crate::store::TallySnapshot;

/// A progress event for one intent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "kebab-case")]
pub enum ProgressEvent {
    /// Intent captured, fingerprint computed
    Submitted { fingerprint: Fingerprint },

    /// Scorer invoked
    Scoring { fingerprint: Fingerprint },

    /// Scorer unavailable; degraded to the unflagged path
    ScorerDegraded {
        fingerprint: Fingerprint,
        reason: String,
    },

    /// Score at or above the flag threshold; VDF path armed
    Flagged {
        fingerprint: Fingerprint,
        score: f64,
    },

    /// Score below the flag threshold
    Unflagged {
        fingerprint: Fingerprint,
        score: f64,
    },

    /// VDF computation underway
    VdfPending {
        fingerprint: Fingerprint,
        progress: u8,
        eta_seconds: Option<u64>,
    },

    /// Voting still open
    VotingPending {
        fingerprint: Fingerprint,
        tally: TallySnapshot,
    },

    /// Envelope assembled
    Ready { fingerprint: Fingerprint },

    /// Envelope handed to the executor
    Executing { fingerprint: Fingerprint },

    /// Terminal outcome reached
    Complete {
        fingerprint: Fingerprint,
        outcome: String,
    },

    /// Intent failed
    Failed {
        fingerprint: Fingerprint,
        reason: String,
    },
}

/// Best-effort sender side of the progress stream
#[derive(Debug, Clone)]
pub struct ProgressSender(Option<mpsc::UnboundedSender<ProgressEvent>>);

impl ProgressSender {
    /// A sender feeding the given channel
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self(Some(tx))
    }

    /// A sender that drops every event
    pub fn disabled() -> Self {
        Self(None)
    }

    /// Create a connected (sender, receiver) pair
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Emit an event; never blocks, never fails
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (sender, rx) = ProgressSender::channel();
        drop(rx);
        // Must not panic or block
        sender.emit(ProgressEvent::Submitted {
            fingerprint: Fingerprint::new([0u8; 32]),
        });
    }

    #[test]
    fn test_disabled_sender_swallows_events() {
        let sender = ProgressSender::disabled();
        sender.emit(ProgressEvent::Ready {
            fingerprint: Fingerprint::new([1u8; 32]),
        });
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sender, mut rx) = ProgressSender::channel();
        let fp = Fingerprint::new([2u8; 32]);
        sender.emit(ProgressEvent::Submitted { fingerprint: fp });
        sender.emit(ProgressEvent::Scoring { fingerprint: fp });

        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::Submitted { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::Scoring { .. }
        ));
    }
}
