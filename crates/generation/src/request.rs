//! The generation request and its enumerations.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CostBudget, ProviderName, RequestId, RequestValidationError};

/// Audience used when a request does not name one.
pub const DEFAULT_AUDIENCE: &str = "general readers";

// ---------------------------------------------------------------------------
// Content type
// ---------------------------------------------------------------------------

/// Kind of content to produce. Selects the prompt template and shapes the
/// validator's expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ContentType {
    /// Long-form newsletter article.
    NewsletterArticle,
    /// Short social media caption.
    Caption,
    /// Step-by-step instructional guide.
    HowToGuide,
    /// Standalone social media post.
    SocialPost,
    /// Blog post.
    BlogPost,
    /// Product description for a listing page.
    ProductDescription,
}

impl ContentType {
    /// Every content type, in declaration order.
    pub const ALL: [ContentType; 6] = [
        Self::NewsletterArticle,
        Self::Caption,
        Self::HowToGuide,
        Self::SocialPost,
        Self::BlogPost,
        Self::ProductDescription,
    ];

    /// The `snake_case` wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewsletterArticle => "newsletter_article",
            Self::Caption => "caption",
            Self::HowToGuide => "how_to_guide",
            Self::SocialPost => "social_post",
            Self::BlogPost => "blog_post",
            Self::ProductDescription => "product_description",
        }
    }

    /// Human-readable label used inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::NewsletterArticle => "newsletter article",
            Self::Caption => "caption",
            Self::HowToGuide => "how-to guide",
            Self::SocialPost => "social media post",
            Self::BlogPost => "blog post",
            Self::ProductDescription => "product description",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = RequestValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|ct| ct.as_str() == normalized)
            .ok_or_else(|| RequestValidationError::UnknownContentType {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for ContentType {
    type Error = RequestValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Optimisation strategy
// ---------------------------------------------------------------------------

/// Routing policy used to rank candidate providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum OptimizationStrategy {
    /// Cheapest provider above the quality floor first.
    CostOptimized,
    /// Highest-rated provider first.
    QualityFirst,
    /// Best quality per dollar first.
    #[default]
    Balanced,
}

impl OptimizationStrategy {
    /// The `snake_case` wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CostOptimized => "cost_optimized",
            Self::QualityFirst => "quality_first",
            Self::Balanced => "balanced",
        }
    }

    /// Instruction appended to prompts so the output matches the strategy.
    pub fn prompt_hint(self) -> &'static str {
        match self {
            Self::CostOptimized => "Be concise and avoid unnecessary elaboration.",
            Self::QualityFirst => {
                "Prioritise depth, accuracy, and polished prose over brevity."
            }
            Self::Balanced => "Balance thoroughness with concision.",
        }
    }
}

impl std::fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationStrategy {
    type Err = RequestValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cost_optimized" => Ok(Self::CostOptimized),
            "quality_first" => Ok(Self::QualityFirst),
            "balanced" => Ok(Self::Balanced),
            _ => Err(RequestValidationError::UnknownStrategy {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for OptimizationStrategy {
    type Error = RequestValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_string()
}

/// Wire shape of a [`ContentRequest`].
///
/// Enumerations and the length arrive as loose JSON values so a bad entry is
/// reported as a [`RequestValidationError`] rather than a decoder error.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPayload {
    #[serde(default)]
    pub id: RequestId,
    pub content_type: String,
    pub topic: String,
    #[serde(default = "default_audience")]
    pub target_audience: String,
    pub max_length: i64,
    #[serde(default)]
    pub optimization_strategy: Option<String>,
    #[serde(default)]
    pub provider_override: Option<String>,
    #[serde(default)]
    pub budget_usd: Option<CostBudget>,
}

impl TryFrom<RequestPayload> for ContentRequest {
    type Error = RequestValidationError;

    fn try_from(payload: RequestPayload) -> Result<Self, Self::Error> {
        let content_type = payload.content_type.parse()?;
        if payload.max_length <= 0 {
            return Err(RequestValidationError::NonPositiveMaxLength {
                value: payload.max_length,
            });
        }
        let max_length =
            u32::try_from(payload.max_length).map_err(|_| RequestValidationError::Malformed {
                reason: format!("max_length {} is out of range", payload.max_length),
            })?;
        let optimization_strategy = payload
            .optimization_strategy
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            id: payload.id,
            content_type,
            topic: payload.topic,
            target_audience: payload.target_audience,
            max_length,
            optimization_strategy,
            provider_override: payload.provider_override,
            budget_usd: payload.budget_usd,
        })
    }
}

/// One unit of content to generate.
///
/// Treated as immutable once built: the orchestrator and router only ever
/// borrow it, and prompt rewrites during a quality retry produce new prompt
/// strings rather than touching the request. Call [`ContentRequest::validate`]
/// (the orchestrator does so first) before acting on a deserialised value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RequestPayload")]
pub struct ContentRequest {
    /// Correlation id; generated when absent from the payload.
    pub id: RequestId,

    /// What to produce.
    pub content_type: ContentType,

    /// Subject of the content. Must not be blank.
    pub topic: String,

    /// Who the content is written for.
    pub target_audience: String,

    /// Upper bound on the content length, in words. Must be positive.
    pub max_length: u32,

    /// Routing policy.
    pub optimization_strategy: OptimizationStrategy,

    /// Pins a single provider; no failover when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_override: Option<String>,

    /// Spend cap for one attempt, used to filter candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_usd: Option<CostBudget>,
}

impl ContentRequest {
    /// Creates a request with a fresh id, the default audience, and the
    /// balanced strategy.
    pub fn new(content_type: ContentType, topic: impl Into<String>, max_length: u32) -> Self {
        Self {
            id: RequestId::new_random(),
            content_type,
            topic: topic.into(),
            target_audience: default_audience(),
            max_length,
            optimization_strategy: OptimizationStrategy::default(),
            provider_override: None,
            budget_usd: None,
        }
    }

    /// Returns a copy with a different target audience.
    #[must_use]
    pub fn with_audience(self, audience: impl Into<String>) -> Self {
        Self {
            target_audience: audience.into(),
            ..self
        }
    }

    /// Returns a copy with a different routing strategy.
    #[must_use]
    pub fn with_strategy(self, strategy: OptimizationStrategy) -> Self {
        Self {
            optimization_strategy: strategy,
            ..self
        }
    }

    /// Returns a copy pinned to one provider.
    #[must_use]
    pub fn with_provider_override(self, provider: impl Into<String>) -> Self {
        Self {
            provider_override: Some(provider.into()),
            ..self
        }
    }

    /// Returns a copy with a spend cap.
    #[must_use]
    pub fn with_budget(self, budget: CostBudget) -> Self {
        Self {
            budget_usd: Some(budget),
            ..self
        }
    }

    /// Checks the request shape.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.topic.trim().is_empty() {
            return Err(RequestValidationError::EmptyTopic);
        }
        if self.max_length == 0 {
            return Err(RequestValidationError::NonPositiveMaxLength { value: 0 });
        }
        if let Some(name) = &self.provider_override {
            if name.trim().is_empty() {
                return Err(RequestValidationError::EmptyProviderOverride);
            }
        }
        Ok(())
    }

    /// The pinned provider, if any, as a typed name.
    pub fn pinned_provider(&self) -> Option<ProviderName> {
        self.provider_override.as_deref().and_then(ProviderName::new)
    }

    /// The audience to address, falling back to [`DEFAULT_AUDIENCE`] when blank.
    pub fn audience(&self) -> &str {
        let audience = self.target_audience.trim();
        if audience.is_empty() {
            DEFAULT_AUDIENCE
        } else {
            audience
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parses_wire_names_and_dashes() {
        assert_eq!("caption".parse::<ContentType>().unwrap(), ContentType::Caption);
        assert_eq!(
            "How-To-Guide".parse::<ContentType>().unwrap(),
            ContentType::HowToGuide
        );
        assert!(matches!(
            "limerick".parse::<ContentType>(),
            Err(RequestValidationError::UnknownContentType { .. })
        ));
    }

    #[test]
    fn blank_topic_is_rejected() {
        let request = ContentRequest::new(ContentType::Caption, "  ", 100);
        assert_eq!(request.validate(), Err(RequestValidationError::EmptyTopic));
    }

    #[test]
    fn zero_length_is_rejected() {
        let request = ContentRequest::new(ContentType::Caption, "coffee", 0);
        assert!(matches!(
            request.validate(),
            Err(RequestValidationError::NonPositiveMaxLength { .. })
        ));
    }

    #[test]
    fn blank_override_is_rejected() {
        let request =
            ContentRequest::new(ContentType::Caption, "coffee", 40).with_provider_override(" ");
        assert_eq!(
            request.validate(),
            Err(RequestValidationError::EmptyProviderOverride)
        );
    }

    #[test]
    fn deserialises_with_defaults() {
        let json = r#"{"content_type":"how_to_guide","topic":"sourdough","max_length":600}"#;
        let request: ContentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.content_type, ContentType::HowToGuide);
        assert_eq!(request.optimization_strategy, OptimizationStrategy::Balanced);
        assert_eq!(request.audience(), DEFAULT_AUDIENCE);
        assert!(request.provider_override.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn negative_budget_fails_to_deserialise() {
        let json = r#"{"content_type":"caption","topic":"tea","max_length":30,"budget_usd":-1.0}"#;
        assert!(serde_json::from_str::<ContentRequest>(json).is_err());
    }

    fn decode(json: &str) -> Result<ContentRequest, RequestValidationError> {
        let payload: RequestPayload = serde_json::from_str(json).unwrap();
        ContentRequest::try_from(payload)
    }

    #[test]
    fn unknown_content_type_is_a_validation_error() {
        let err = decode(r#"{"content_type":"limerick","topic":"cats","max_length":20}"#)
            .unwrap_err();
        assert_eq!(
            err,
            RequestValidationError::UnknownContentType {
                value: "limerick".into()
            }
        );
    }

    #[test]
    fn negative_length_is_a_validation_error() {
        let err =
            decode(r#"{"content_type":"caption","topic":"cats","max_length":-5}"#).unwrap_err();
        assert_eq!(err, RequestValidationError::NonPositiveMaxLength { value: -5 });
    }

    #[test]
    fn unknown_strategy_is_a_validation_error() {
        let err = decode(
            r#"{"content_type":"caption","topic":"cats","max_length":20,"optimization_strategy":"fastest"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RequestValidationError::UnknownStrategy { .. }));
    }

    #[test]
    fn direct_deserialisation_reports_the_validation_message() {
        let err = serde_json::from_str::<ContentRequest>(
            r#"{"content_type":"limerick","topic":"cats","max_length":20}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown content type 'limerick'"));
    }

    #[test]
    fn serialised_request_reads_back() {
        let request = ContentRequest::new(ContentType::SocialPost, "kayaks", 80)
            .with_strategy(OptimizationStrategy::QualityFirst);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(serde_json::from_str::<ContentRequest>(&json).unwrap(), request);
    }
}
