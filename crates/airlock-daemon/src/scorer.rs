//! Risk scorer adapter
//!
//! The ML model behind the scorer is an external collaborator; the
//! orchestrator only sees a bounded score and a verdict. Transport and
//! feature extraction are hidden behind the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use airlock_core::intent::TransactionIntent;
use airlock_core::types::{RiskScore, Verdict};

/// Scorer output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Bounded score in [0, 100]
    pub score: RiskScore,

    /// Coarse verdict band
    pub verdict: Verdict,

    /// Optional human-readable rationale
    pub explanation: Option<String>,
}

impl RiskAssessment {
    /// Band a raw score into a verdict
    pub fn from_score(score: f64, explanation: Option<String>) -> Self {
        let score = RiskScore::new(score);
        let verdict = if score.value() >= 80.0 {
            Verdict::Dangerous
        } else if score.value() >= 50.0 {
            Verdict::Suspicious
        } else {
            Verdict::Safe
        };
        Self {
            score,
            verdict,
            explanation,
        }
    }
}

/// Capability interface to the risk scorer
///
/// Synchronous from the orchestrator's view; the orchestrator applies its
/// own timeout and degrades to the unflagged path when the scorer is
/// unavailable.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    /// Score a candidate transaction
    async fn analyze(&self, intent: &TransactionIntent) -> anyhow::Result<RiskAssessment>;
}

/// In-memory scorer for tests and local runs
///
/// Scores by value bands and honors an optional artificial delay so tests
/// can exercise the scorer timeout path.
pub struct MockScorer {
    /// Fixed score override; when unset, scores by value
    pub fixed_score: Option<f64>,

    /// Artificial response delay
    pub delay_ms: u64,

    /// When set, every call errors
    pub fail: bool,
}

impl Default for MockScorer {
    fn default() -> Self {
        Self {
            fixed_score: None,
            delay_ms: 0,
            fail: false,
        }
    }
}

impl MockScorer {
    pub fn fixed(score: f64) -> Self {
        Self {
            fixed_score: Some(score),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(score: f64, delay_ms: u64) -> Self {
        Self {
            fixed_score: Some(score),
            delay_ms,
            fail: false,
        }
    }
}

#[async_trait]
impl RiskScorer for MockScorer {
    async fn analyze(&self, intent: &TransactionIntent) -> anyhow::Result<RiskAssessment> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            anyhow::bail!("scorer transport error");
        }
        let score = self.fixed_score.unwrap_or_else(|| {
            // Larger transfers score higher in the absence of a model
            match intent.value {
                0..=99 => 15.0,
                100..=999 => 60.0,
                _ => 90.0,
            }
        });
        Ok(RiskAssessment::from_score(score, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_core::types::ChainTag;

    fn intent(value: u128) -> TransactionIntent {
        TransactionIntent {
            sender: vec![1; 20],
            destination: vec![2; 20],
            value,
            payload: vec![],
            source_chain: ChainTag::ETHEREUM,
            dest_chain: None,
        }
    }

    #[tokio::test]
    async fn test_verdict_bands() {
        assert!(matches!(
            RiskAssessment::from_score(15.0, None).verdict,
            Verdict::Safe
        ));
        assert!(matches!(
            RiskAssessment::from_score(65.0, None).verdict,
            Verdict::Suspicious
        ));
        assert!(matches!(
            RiskAssessment::from_score(95.0, None).verdict,
            Verdict::Dangerous
        ));
    }

    #[tokio::test]
    async fn test_mock_scores_by_value() {
        let scorer = MockScorer::default();
        let low = scorer.analyze(&intent(10)).await.unwrap();
        let high = scorer.analyze(&intent(5000)).await.unwrap();
        assert!(low.score.value() < high.score.value());
    }

    #[tokio::test]
    async fn test_failing_mock_errors() {
        let scorer = MockScorer::failing();
        assert!(scorer.analyze(&intent(10)).await.is_err());
    }
}
