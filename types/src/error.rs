//! Errors raised while validating shared parameters.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("thresholds must satisfy approve_max < medium_max < 100 (got {approve_max}, {medium_max})")]
    InvalidThresholds { approve_max: u8, medium_max: u8 },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("oracle fallback score {0} is outside 0..=100")]
    InvalidFallbackScore(u8),
}
