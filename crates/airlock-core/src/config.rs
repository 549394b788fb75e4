//! Airlock protocol configuration

use serde::{Deserialize, Serialize};

use crate::{
    APPROVAL_THRESHOLD, CHECKPOINT_EVERY, FLAG_THRESHOLD, GUARDIAN_COUNT, PROPOSAL_DEADLINE_SECS,
    SCORER_TIMEOUT_MS, VDF_ITERATIONS,
};

/// Per-deployment protocol parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirlockConfig {
    /// Total guardian slots
    pub guardian_count: u8,

    /// Approvals required to finalize as approved
    pub approval_threshold: u8,

    /// Score at or above which the VDF path is engaged
    pub flag_threshold: f64,

    /// Sequential squarings required of a flagged transaction
    pub vdf_iterations: u64,

    /// Hard proposal deadline in seconds
    pub proposal_deadline_secs: u64,

    /// Scorer call timeout in milliseconds
    pub scorer_timeout_ms: u64,

    /// VDF progress/bypass checkpoint granularity
    pub checkpoint_every: u64,
}

impl Default for AirlockConfig {
    fn default() -> Self {
        Self {
            guardian_count: GUARDIAN_COUNT,
            approval_threshold: APPROVAL_THRESHOLD,
            flag_threshold: FLAG_THRESHOLD,
            vdf_iterations: VDF_ITERATIONS,
            proposal_deadline_secs: PROPOSAL_DEADLINE_SECS,
            scorer_timeout_ms: SCORER_TIMEOUT_MS,
            checkpoint_every: CHECKPOINT_EVERY,
        }
    }
}

impl AirlockConfig {
    /// Rejections required to finalize as rejected
    ///
    /// Derived so approval and rejection thresholds sum to N+1.
    pub fn rejection_threshold(&self) -> u8 {
        self.guardian_count - self.approval_threshold + 1
    }

    /// Validate threshold arithmetic
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.guardian_count == 0 {
            return Err("guardian_count must be >= 1");
        }
        if self.approval_threshold == 0 || self.approval_threshold > self.guardian_count {
            return Err("approval_threshold must be in 1..=guardian_count");
        }
        if !(0.0..=100.0).contains(&self.flag_threshold) {
            return Err("flag_threshold must be in [0, 100]");
        }
        if self.checkpoint_every == 0 {
            return Err("checkpoint_every must be >= 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = AirlockConfig::default();
        config.validate().unwrap();
        assert_eq!(config.guardian_count, 10);
        assert_eq!(config.approval_threshold, 7);
        assert_eq!(config.rejection_threshold(), 4);
        // Thresholds sum to N+1 so ties are impossible
        assert_eq!(
            config.approval_threshold + config.rejection_threshold(),
            config.guardian_count + 1
        );
    }

    #[test]
    fn test_validation_rejects_bad_thresholds() {
        let mut config = AirlockConfig::default();
        config.approval_threshold = 11;
        assert!(config.validate().is_err());

        config = AirlockConfig::default();
        config.checkpoint_every = 0;
        assert!(config.validate().is_err());
    }
}
