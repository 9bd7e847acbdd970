//! Risk scores, tiers and the decisions derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A risk score in `0..=100`, as returned by the scoring oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(u8);

impl RiskScore {
    pub const MAX: u8 = 100;

    /// Range-check a raw score. Returns `None` outside `0..=100`.
    pub fn new(raw: i64) -> Option<Self> {
        if (0..=Self::MAX as i64).contains(&raw) {
            Some(Self(raw as u8))
        } else {
            None
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Risk tier of a classified score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default action for a risk tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Leave the token alone.
    Approve,
    /// Freeze the token and request verification.
    Challenge,
    /// Freeze, request verification, and flag as an auto-revoke candidate.
    ChallengeHigh,
}

impl Decision {
    /// Whether this decision opens a verification window.
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Challenge | Self::ChallengeHigh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Challenge => "challenge",
            Self::ChallengeHigh => "challenge_high",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision supplied by an external triage process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentDecision {
    Approve,
    Challenge,
    ChallengeHigh,
    Revoke,
}

impl AgentDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Challenge => "challenge",
            Self::ChallengeHigh => "challenge_high",
            Self::Revoke => "revoke",
        }
    }

    /// Lenient parse of a free-text recommendation. Anything that is not
    /// exactly one of the four decisions falls back to `Challenge`.
    pub fn from_llm_output(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Challenge)
    }
}

impl fmt::Display for AgentDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict, case-insensitive parse. Unknown values are rejected.
impl FromStr for AgentDecision {
    type Err = UnknownDecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "challenge" => Ok(Self::Challenge),
            "challenge_high" => Ok(Self::ChallengeHigh),
            "revoke" => Ok(Self::Revoke),
            _ => Err(UnknownDecision(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown decision {0:?}: expected approve, challenge, challenge_high or revoke")]
pub struct UnknownDecision(pub String);
