//! Pluggable risk-scoring oracle.
//!
//! The lifecycle core does not care how a score is produced: a rules engine,
//! a hosted model, or a fixed value in tests all implement [`RiskOracle`].

use crate::OracleError;
use serde::{Deserialize, Serialize};

/// Signals describing one payment attempt. Every field is optional on the
/// wire; missing values read as "nothing suspicious".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionContext {
    /// Amount in minor currency units.
    pub amount: u64,
    /// The customer's historical average amount, if known.
    pub user_avg_amount: Option<u64>,
    /// Device fingerprint trust, 0..=100.
    pub device_trust_score: Option<u8>,
    pub usual_location: Option<String>,
    pub current_location: Option<String>,
    pub vpn_detected: bool,
    pub new_device: bool,
    /// Transactions by the same customer in the last hour.
    pub transactions_last_hour: u32,
    pub unusual_time: bool,
    pub rushed_transaction: bool,
}

/// What an oracle returns. `score` is deliberately unchecked here; the
/// caller range-checks it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: i64,
    pub explanation: String,
}

pub trait RiskOracle: Send + Sync {
    /// Human-readable name of this oracle.
    fn name(&self) -> &str;

    /// Score a transaction.
    fn assess(&self, ctx: &TransactionContext) -> Result<RiskAssessment, OracleError>;
}
