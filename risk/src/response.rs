//! Parsing of merchant verification replies and triage recommendations.

use serde::{Deserialize, Serialize};
use tokentrust_types::AgentDecision;

const SUCCESS_WORDS: &[&str] = &["yes", "approve", "authorized", "legitimate", "valid", "correct"];
const FAILURE_WORDS: &[&str] = &[
    "no",
    "deny",
    "fraud",
    "suspicious",
    "unauthorized",
    "invalid",
    "wrong",
];

/// Interpret a merchant's free-text reply as verified / not verified.
///
/// Matching is per word, case-insensitive. A failure word anywhere wins over
/// any success word, and text with neither counts as not verified.
pub fn interpret_response(text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| FAILURE_WORDS.contains(w)) {
        return false;
    }
    words.iter().any(|w| SUCCESS_WORDS.contains(w))
}

/// A triage recommendation split out of model output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub summary: Option<String>,
    pub decision: AgentDecision,
    /// False when the output was not in the two-line form.
    pub well_formed: bool,
}

/// Parse "summary\nrecommendation" output. Anything else is read as a bare
/// recommendation with no summary.
pub fn parse_recommendation(output: &str) -> Recommendation {
    let mut lines = output.trim().lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(summary), Some(recommendation)) => Recommendation {
            summary: Some(summary.to_string()),
            decision: AgentDecision::from_llm_output(recommendation),
            well_formed: true,
        },
        _ => Recommendation {
            summary: None,
            decision: AgentDecision::from_llm_output(output),
            well_formed: false,
        },
    }
}
