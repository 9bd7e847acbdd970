//! Deterministic heuristic oracle.
//!
//! Each triggered signal is labelled `HIGH` or `MEDIUM` and adds a fixed
//! weight to a small base score. The result is capped at 100.

use crate::{OracleError, RiskAssessment, RiskOracle, TransactionContext};
use tracing::debug;

const BASE_SCORE: i64 = 10;
const HIGH_WEIGHT: i64 = 30;
const MEDIUM_WEIGHT: i64 = 15;

/// Average assumed when the customer has no history.
const DEFAULT_AVG_AMOUNT: u64 = 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Severity {
    High,
    Medium,
}

impl Severity {
    fn weight(self) -> i64 {
        match self {
            Self::High => HIGH_WEIGHT,
            Self::Medium => MEDIUM_WEIGHT,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::High => "HIGH_RISK",
            Self::Medium => "MEDIUM_RISK",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RuleBasedOracle;

impl RuleBasedOracle {
    pub fn new() -> Self {
        Self
    }

    fn signals(ctx: &TransactionContext) -> Vec<(Severity, &'static str)> {
        let mut out = Vec::new();

        if let Some(trust) = ctx.device_trust_score {
            if trust < 30 {
                out.push((Severity::High, "low device trust score"));
            } else if trust < 70 {
                out.push((Severity::Medium, "moderate device trust score"));
            }
        }

        if let (Some(usual), Some(current)) = (&ctx.usual_location, &ctx.current_location) {
            if !usual.is_empty() && usual != current {
                out.push((Severity::Medium, "geographic location changed"));
            }
        }

        if ctx.vpn_detected {
            out.push((Severity::High, "VPN usage detected"));
        }
        if ctx.new_device {
            out.push((Severity::Medium, "transaction from new device"));
        }

        let avg = ctx.user_avg_amount.unwrap_or(DEFAULT_AVG_AMOUNT);
        if ctx.amount > avg.saturating_mul(10) {
            out.push((Severity::High, "amount is 10x the customer's average"));
        } else if ctx.amount > avg.saturating_mul(5) {
            out.push((Severity::Medium, "amount is 5x the customer's average"));
        }

        if ctx.transactions_last_hour > 10 {
            out.push((Severity::High, "transaction velocity very high"));
        } else if ctx.transactions_last_hour > 5 {
            out.push((Severity::Medium, "elevated transaction velocity"));
        }

        if ctx.unusual_time {
            out.push((Severity::Medium, "unusual transaction time"));
        }
        if ctx.rushed_transaction {
            out.push((Severity::Medium, "rushed transaction behaviour"));
        }

        out
    }
}

impl RiskOracle for RuleBasedOracle {
    fn name(&self) -> &str {
        "rules"
    }

    fn assess(&self, ctx: &TransactionContext) -> Result<RiskAssessment, OracleError> {
        if ctx.device_trust_score.is_some_and(|t| t > 100) {
            return Err(OracleError::InvalidInput(
                "device_trust_score must be within 0..=100".into(),
            ));
        }

        let signals = Self::signals(ctx);
        let score = signals
            .iter()
            .fold(BASE_SCORE, |acc, (sev, _)| acc + sev.weight())
            .min(100);

        let explanation = if signals.is_empty() {
            "LOW_RISK: no risk signals detected".to_string()
        } else {
            signals
                .iter()
                .map(|(sev, what)| format!("{}: {what}", sev.label()))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        debug!(score, signals = signals.len(), "rule-based assessment");
        Ok(RiskAssessment { score, explanation })
    }
}
