//! Risk classification for TokenTrust.
//!
//! - **Classifier**: pure mapping of a 0..=100 score onto a tier and a default
//!   decision using the process-wide thresholds.
//! - **Oracle**: pluggable source of scores. The lifecycle core only
//!   range-checks and classifies what an oracle returns.
//! - **Response parsing**: merchant free-text replies and triage
//!   recommendations.

pub mod classifier;
pub mod error;
pub mod oracle;
pub mod response;
pub mod rules;

pub use classifier::{classify, classify_score, Classification};
pub use error::{OracleError, RiskError};
pub use oracle::{RiskAssessment, RiskOracle, TransactionContext};
pub use response::{interpret_response, parse_recommendation, Recommendation};
pub use rules::RuleBasedOracle;
