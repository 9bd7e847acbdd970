//! Nullable risk oracle: returns pre-configured results in order.

use std::sync::Mutex;
use tokentrust_risk::{OracleError, RiskAssessment, RiskOracle, TransactionContext};

pub struct NullOracle {
    results: Mutex<Vec<Result<RiskAssessment, OracleError>>>,
    index: Mutex<usize>,
}

impl NullOracle {
    /// Cycle through `results`, one per call.
    pub fn new(results: Vec<Result<RiskAssessment, OracleError>>) -> Self {
        Self {
            results: Mutex::new(results),
            index: Mutex::new(0),
        }
    }

    /// Always return `score`.
    pub fn constant(score: i64) -> Self {
        Self::new(vec![Ok(RiskAssessment {
            score,
            explanation: format!("constant score {score}"),
        })])
    }

    /// Always fail as unavailable.
    pub fn unavailable() -> Self {
        Self::new(vec![Err(OracleError::Unavailable("null-oracle".into()))])
    }
}

impl RiskOracle for NullOracle {
    fn name(&self) -> &str {
        "null-oracle"
    }

    fn assess(&self, _ctx: &TransactionContext) -> Result<RiskAssessment, OracleError> {
        let results = self.results.lock().unwrap();
        if results.is_empty() {
            return Err(OracleError::Unavailable("null-oracle has no results".into()));
        }
        let mut idx = self.index.lock().unwrap();
        let current = *idx % results.len();
        *idx += 1;
        results[current].clone()
    }
}
