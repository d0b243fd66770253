//! Reference quality validator.
//!
//! Starts from a perfect score and deducts for each rule the text breaks.
//! Every deduction comes with a corrective sentence that the orchestrator can
//! feed back into the retry prompt.

use generation::{ContentRequest, ContentType, QualityScore, QualityValidator, ValidationOutcome};
use serde::{Deserialize, Serialize};

const LENGTH_PENALTY: f64 = 3.0;
const SHORTFALL_PENALTY: f64 = 2.0;
const OFF_TOPIC_PENALTY: f64 = 3.0;
const BANNED_PHRASE_PENALTY: f64 = 2.0;

/// Validator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum score (inclusive) that passes the quality gate.
    pub quality_threshold: f64,
    /// Case-insensitive phrases that must not appear in the output.
    pub banned_phrases: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 7.0,
            banned_phrases: vec![
                "as an ai".into(),
                "lorem ipsum".into(),
                "[insert".into(),
                "todo:".into(),
            ],
        }
    }
}

/// Rule-based implementation of [`QualityValidator`].
#[derive(Debug, Clone)]
pub struct RuleBasedValidator {
    threshold: QualityScore,
    banned_phrases: Vec<String>,
}

impl RuleBasedValidator {
    /// Builds a validator; the threshold is clamped into `[0, 10]`.
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            threshold: QualityScore::saturating(config.quality_threshold),
            banned_phrases: config
                .banned_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// The pass threshold.
    pub fn threshold(&self) -> QualityScore {
        self.threshold
    }
}

impl Default for RuleBasedValidator {
    fn default() -> Self {
        Self::new(&ValidatorConfig::default())
    }
}

/// Short-form content has no lower length bound.
fn minimum_words(content_type: ContentType, max_length: u32) -> usize {
    match content_type {
        ContentType::Caption | ContentType::SocialPost => 0,
        _ => (max_length / 4) as usize,
    }
}

fn mentions_topic(lowered_text: &str, topic: &str) -> bool {
    let keywords: Vec<String> = topic
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(str::to_lowercase)
        .collect();
    if keywords.is_empty() {
        return lowered_text.contains(&topic.trim().to_lowercase());
    }
    keywords.iter().any(|k| lowered_text.contains(k.as_str()))
}

impl QualityValidator for RuleBasedValidator {
    fn validate(&self, text: &str, request: &ContentRequest) -> ValidationOutcome {
        let words = text.split_whitespace().count();
        if words == 0 {
            return ValidationOutcome::from_score(
                QualityScore::MIN,
                self.threshold,
                vec!["The response was empty; produce the requested content.".into()],
            );
        }

        let lowered = text.to_lowercase();
        let mut score = 10.0;
        let mut issues = Vec::new();

        let max_words = request.max_length as usize;
        if words > max_words {
            score -= LENGTH_PENALTY;
            issues.push(format!(
                "Keep the content under {max_words} words (the draft had {words})."
            ));
        }

        let min_words = minimum_words(request.content_type, request.max_length);
        if words < min_words {
            score -= SHORTFALL_PENALTY;
            issues.push(format!(
                "Develop the content further; the draft had only {words} words."
            ));
        }

        if !mentions_topic(&lowered, &request.topic) {
            score -= OFF_TOPIC_PENALTY;
            issues.push(format!(
                "Address the topic '{}' explicitly.",
                request.topic.trim()
            ));
        }

        for phrase in &self.banned_phrases {
            if lowered.contains(phrase.as_str()) {
                score -= BANNED_PHRASE_PENALTY;
                issues.push(format!("Remove the phrase '{phrase}'."));
            }
        }

        ValidationOutcome::from_score(QualityScore::saturating(score), self.threshold, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption(topic: &str) -> ContentRequest {
        ContentRequest::new(ContentType::Caption, topic, 12)
    }

    #[test]
    fn clean_text_passes_with_full_score() {
        let outcome = RuleBasedValidator::default()
            .validate("Fresh espresso every morning, brewed slow.", &caption("espresso"));
        assert!(outcome.passed);
        assert_eq!(outcome.score, QualityScore::MAX);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn empty_text_scores_zero() {
        let outcome = RuleBasedValidator::default().validate("   ", &caption("espresso"));
        assert!(!outcome.passed);
        assert_eq!(outcome.score, QualityScore::MIN);
        assert_eq!(outcome.issues.len(), 1);
    }

    #[test]
    fn off_topic_and_banned_phrase_fail() {
        let outcome = RuleBasedValidator::default()
            .validate("As an AI I like trains.", &caption("espresso"));
        assert!(!outcome.passed);
        assert_eq!(outcome.score.as_f64(), 5.0);
        assert_eq!(outcome.issues.len(), 2);
    }

    #[test]
    fn overlong_text_is_penalised() {
        let text = "espresso ".repeat(20);
        let outcome = RuleBasedValidator::default().validate(&text, &caption("espresso"));
        assert_eq!(outcome.score.as_f64(), 7.0);
        assert!(outcome.passed);
        assert!(outcome.issues[0].contains("under 12 words"));
    }

    #[test]
    fn long_form_content_has_a_lower_bound() {
        let request = ContentRequest::new(ContentType::BlogPost, "espresso", 400);
        let outcome = RuleBasedValidator::default().validate("Espresso is nice.", &request);
        assert_eq!(outcome.score.as_f64(), 8.0);
        assert!(outcome.issues[0].contains("Develop the content further"));
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = RuleBasedValidator::new(&ValidatorConfig {
            quality_threshold: 9.5,
            banned_phrases: vec![],
        });
        let text = "espresso ".repeat(20);
        assert!(!strict.validate(&text, &caption("espresso")).passed);
    }
}
