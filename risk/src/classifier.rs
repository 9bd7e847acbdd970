//! Score → (tier, default decision).

use crate::RiskError;
use serde::{Deserialize, Serialize};
use tokentrust_types::{Decision, RiskScore, RiskThresholds, RiskTier};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub score: RiskScore,
    pub tier: RiskTier,
    pub decision: Decision,
}

impl Classification {
    /// High-tier scores flag the token for automatic revocation review.
    pub fn auto_revoke_candidate(&self) -> bool {
        self.decision == Decision::ChallengeHigh
    }
}

/// Classify a raw score. Fails only when the score is outside `0..=100`.
pub fn classify(score: i64, thresholds: &RiskThresholds) -> Result<Classification, RiskError> {
    let score = RiskScore::new(score).ok_or(RiskError::InvalidScore(score))?;
    Ok(classify_score(score, thresholds))
}

/// Classify an already range-checked score. Total.
pub fn classify_score(score: RiskScore, thresholds: &RiskThresholds) -> Classification {
    let (tier, decision) = if score.value() <= thresholds.approve_max {
        (RiskTier::Low, Decision::Approve)
    } else if score.value() <= thresholds.medium_max {
        (RiskTier::Medium, Decision::Challenge)
    } else {
        (RiskTier::High, Decision::ChallengeHigh)
    };
    Classification {
        score,
        tier,
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(score: i64) -> Classification {
        classify(score, &RiskThresholds::default()).unwrap()
    }

    #[test]
    fn canonical_boundaries() {
        assert_eq!(c(0).decision, Decision::Approve);
        assert_eq!(c(49).tier, RiskTier::Low);
        assert_eq!(c(50).tier, RiskTier::Medium);
        assert_eq!(c(79).decision, Decision::Challenge);
        assert_eq!(c(80).decision, Decision::ChallengeHigh);
        assert_eq!(c(100).tier, RiskTier::High);
    }

    #[test]
    fn only_high_is_auto_revoke_candidate() {
        assert!(!c(20).auto_revoke_candidate());
        assert!(!c(65).auto_revoke_candidate());
        assert!(c(90).auto_revoke_candidate());
    }

    #[test]
    fn out_of_range_rejected() {
        let t = RiskThresholds::default();
        assert_eq!(classify(-1, &t), Err(RiskError::InvalidScore(-1)));
        assert_eq!(classify(101, &t), Err(RiskError::InvalidScore(101)));
    }

    #[test]
    fn custom_thresholds_shift_tiers() {
        let t = RiskThresholds {
            approve_max: 30,
            medium_max: 60,
        };
        assert_eq!(classify(31, &t).unwrap().tier, RiskTier::Medium);
        assert_eq!(classify(61, &t).unwrap().tier, RiskTier::High);
    }
}
