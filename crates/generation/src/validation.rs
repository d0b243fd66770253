//! Quality validator port.

use serde::{Deserialize, Serialize};

use crate::{ContentRequest, QualityScore};

/// Verdict of a quality validator on one piece of generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Score in `[0, 10]`.
    pub score: QualityScore,
    /// `true` when `score` reached the validator's threshold.
    pub passed: bool,
    /// Corrective sentences describing what fell short. Fed back into the
    /// prompt on a quality retry.
    pub issues: Vec<String>,
}

impl ValidationOutcome {
    /// Builds an outcome, deriving `passed` from `threshold`.
    pub fn from_score(score: QualityScore, threshold: QualityScore, issues: Vec<String>) -> Self {
        Self {
            passed: score >= threshold,
            score,
            issues,
        }
    }
}

/// Scores generated content. Scoring rules are the implementation's concern;
/// the orchestrator only reads the outcome.
///
/// Validation is synchronous and in-memory: provider calls are the only
/// suspension points of a request.
pub trait QualityValidator: Send + Sync {
    /// Scores `text` produced for `request`.
    fn validate(&self, text: &str, request: &ContentRequest) -> ValidationOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_is_inclusive_of_threshold() {
        let threshold = QualityScore::new(7.0).unwrap();
        let at = ValidationOutcome::from_score(threshold, threshold, vec![]);
        let below = ValidationOutcome::from_score(QualityScore::new(6.9).unwrap(), threshold, vec![]);
        assert!(at.passed);
        assert!(!below.passed);
    }
}
