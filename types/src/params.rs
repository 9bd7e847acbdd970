//! Process-wide lifecycle parameters.
//!
//! Loaded once at start-up (from the service config) and shared read-only by
//! the classifier and the lifecycle core.

use crate::error::ParamsError;
use serde::{Deserialize, Serialize};

/// Canonical score thresholds.
///
/// Only the upper bounds of the two lower tiers are stored; the lower bounds
/// of the next tier are derived so the three tiers always partition `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Highest score that is approved outright (`APPROVE_MAX`).
    #[serde(default = "default_approve_max")]
    pub approve_max: u8,
    /// Highest score in the medium tier (`MEDIUM_MAX`).
    #[serde(default = "default_medium_max")]
    pub medium_max: u8,
}

impl RiskThresholds {
    /// `MEDIUM_MIN`.
    pub fn medium_min(&self) -> u8 {
        self.approve_max + 1
    }

    /// `HIGH_MIN`.
    pub fn high_min(&self) -> u8 {
        self.medium_max + 1
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.approve_max >= self.medium_max || self.medium_max >= 100 {
            return Err(ParamsError::InvalidThresholds {
                approve_max: self.approve_max,
                medium_max: self.medium_max,
            });
        }
        Ok(())
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            approve_max: default_approve_max(),
            medium_max: default_medium_max(),
        }
    }
}

/// All tunables of the lifecycle core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleParams {
    #[serde(flatten)]
    pub thresholds: RiskThresholds,

    /// Length of the verification window opened by a challenge.
    #[serde(default = "default_verification_timeout_secs")]
    pub verification_timeout_secs: u64,

    /// Lifetime of a newly issued token.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Score applied when the risk oracle cannot produce one.
    #[serde(default = "default_oracle_fallback_score")]
    pub oracle_fallback_score: u8,
}

impl LifecycleParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.thresholds.validate()?;
        if self.verification_timeout_secs == 0 {
            return Err(ParamsError::ZeroDuration("verification_timeout_secs"));
        }
        if self.token_ttl_secs == 0 {
            return Err(ParamsError::ZeroDuration("token_ttl_secs"));
        }
        if self.oracle_fallback_score > 100 {
            return Err(ParamsError::InvalidFallbackScore(self.oracle_fallback_score));
        }
        Ok(())
    }
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            verification_timeout_secs: default_verification_timeout_secs(),
            token_ttl_secs: default_token_ttl_secs(),
            oracle_fallback_score: default_oracle_fallback_score(),
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_approve_max() -> u8 {
    49
}

fn default_medium_max() -> u8 {
    79
}

fn default_verification_timeout_secs() -> u64 {
    600
}

fn default_token_ttl_secs() -> u64 {
    3_600
}

fn default_oracle_fallback_score() -> u8 {
    50
}
