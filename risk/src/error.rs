use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    #[error("risk score {0} is outside 0..=100")]
    InvalidScore(i64),
}

/// Failure of a scoring oracle. The core recovers from every variant by
/// applying its fallback score.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle {0} is unavailable")]
    Unavailable(String),

    #[error("oracle returned score {0} outside 0..=100")]
    OutOfRange(i64),

    #[error("oracle input rejected: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}
