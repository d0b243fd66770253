//! Prompt templates, one per content type.
//!
//! Templates use `{placeholder}` markers:
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{topic}` | request topic |
//! | `{audience}` | target audience (defaulted when blank) |
//! | `{max_length}` | word limit |
//! | `{content_type}` | human-readable content type |
//! | `{strategy_hint}` | instruction derived from the optimisation strategy |

use std::collections::HashMap;

use generation::{ContentRequest, ContentType, GenerationError};

/// A prompt template for one content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    body: String,
}

impl PromptTemplate {
    /// Wraps a template body.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// The raw template text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Interpolates the request into the template in a single pass, so
    /// placeholder text inside request values is kept literally.
    pub fn render(&self, request: &ContentRequest) -> String {
        let mut out = String::with_capacity(self.body.len() + request.topic.len());
        let mut rest = self.body.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let value = tail
                .find('}')
                .and_then(|close| placeholder(&tail[1..close], request).map(|v| (close, v)));
            match value {
                Some((close, value)) => {
                    out.push_str(&value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn placeholder(name: &str, request: &ContentRequest) -> Option<String> {
    let value = match name {
        "topic" => request.topic.trim().to_string(),
        "audience" => request.audience().to_string(),
        "max_length" => request.max_length.to_string(),
        "content_type" => request.content_type.label().to_string(),
        "strategy_hint" => request.optimization_strategy.prompt_hint().to_string(),
        _ => return None,
    };
    Some(value)
}

fn builtin_body(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::NewsletterArticle => {
            "Write a newsletter article about {topic} for {audience}.\n\
             Open with a hook, develop two or three key points with concrete \
             examples, and close with a clear takeaway.\n\
             Stay under {max_length} words. {strategy_hint}"
        }
        ContentType::Caption => {
            "Write a single caption about {topic} for {audience}.\n\
             Make it punchy and specific. Stay under {max_length} words. {strategy_hint}"
        }
        ContentType::HowToGuide => {
            "Write a how-to guide on {topic} for {audience}.\n\
             List prerequisites first, then numbered steps, then common mistakes \
             to avoid.\nStay under {max_length} words. {strategy_hint}"
        }
        ContentType::SocialPost => {
            "Write a social media post about {topic} for {audience}.\n\
             Lead with the most interesting detail and end with a question or \
             call to action.\nStay under {max_length} words. {strategy_hint}"
        }
        ContentType::BlogPost => {
            "Write a blog post about {topic} for {audience}.\n\
             Use a descriptive title, short sections with subheadings, and a \
             conclusion.\nStay under {max_length} words. {strategy_hint}"
        }
        ContentType::ProductDescription => {
            "Write a product description for {topic}, aimed at {audience}.\n\
             Describe the main benefit first, then the key features.\n\
             Stay under {max_length} words. {strategy_hint}"
        }
    }
}

/// Content-type → template lookup.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<ContentType, PromptTemplate>,
}

impl TemplateCatalog {
    /// A catalog with no templates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A catalog with the built-in template for every content type.
    pub fn builtin() -> Self {
        ContentType::ALL
            .into_iter()
            .fold(Self::empty(), |catalog, ct| {
                catalog.with_template(ct, PromptTemplate::new(builtin_body(ct)))
            })
    }

    /// Returns a catalog with `template` registered for `content_type`,
    /// replacing any existing one.
    #[must_use]
    pub fn with_template(mut self, content_type: ContentType, template: PromptTemplate) -> Self {
        self.templates.insert(content_type, template);
        self
    }

    /// Looks up the template for `content_type`.
    pub fn resolve(&self, content_type: ContentType) -> Result<&PromptTemplate, GenerationError> {
        self.templates
            .get(&content_type)
            .ok_or_else(|| GenerationError::UnknownContentType {
                content_type: content_type.to_string(),
            })
    }
}

/// Builds the corrective prompt for the single quality retry: the original
/// prompt followed by the validator's issues as revision instructions.
pub fn corrective_prompt(original: &str, issues: &[String]) -> String {
    let mut prompt = String::with_capacity(original.len() + 256);
    prompt.push_str(original);
    prompt.push_str(
        "\n\nA previous draft for this request fell short of the quality bar. \
         Write a new version that fixes the following problems:\n",
    );
    if issues.is_empty() {
        prompt.push_str("- Improve clarity, accuracy, and relevance to the topic.\n");
    }
    for issue in issues {
        prompt.push_str("- ");
        prompt.push_str(issue.trim());
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation::OptimizationStrategy;

    #[test]
    fn builtin_catalog_covers_every_content_type() {
        let catalog = TemplateCatalog::builtin();
        for ct in ContentType::ALL {
            assert!(catalog.resolve(ct).is_ok(), "missing template for {ct}");
        }
    }

    #[test]
    fn render_fills_every_placeholder() {
        let request = ContentRequest::new(ContentType::HowToGuide, "repotting orchids", 400)
            .with_audience("new gardeners")
            .with_strategy(OptimizationStrategy::CostOptimized);
        let prompt = TemplateCatalog::builtin()
            .resolve(ContentType::HowToGuide)
            .unwrap()
            .render(&request);

        assert!(prompt.contains("repotting orchids"));
        assert!(prompt.contains("new gardeners"));
        assert!(prompt.contains("400 words"));
        assert!(prompt.contains(OptimizationStrategy::CostOptimized.prompt_hint()));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn missing_template_is_unknown_content_type() {
        let catalog = TemplateCatalog::empty();
        assert!(matches!(
            catalog.resolve(ContentType::Caption),
            Err(GenerationError::UnknownContentType { .. })
        ));
    }

    #[test]
    fn overrides_replace_builtin() {
        let catalog = TemplateCatalog::builtin()
            .with_template(ContentType::Caption, PromptTemplate::new("Caption: {topic}"));
        let request = ContentRequest::new(ContentType::Caption, "rain", 20);
        assert_eq!(
            catalog.resolve(ContentType::Caption).unwrap().render(&request),
            "Caption: rain"
        );
    }

    #[test]
    fn corrective_prompt_lists_issues() {
        let issues = vec!["Mention the topic.".to_string(), "Be shorter.".to_string()];
        let prompt = corrective_prompt("base", &issues);
        assert!(prompt.starts_with("base"));
        assert!(prompt.contains("- Mention the topic.\n"));
        assert!(prompt.contains("- Be shorter.\n"));
    }

    #[test]
    fn placeholders_inside_values_are_not_expanded() {
        let request = ContentRequest::new(ContentType::Caption, "braces {audience} {max_length}", 20)
            .with_audience("potters");
        let rendered = PromptTemplate::new("About {topic} for {audience}.").render(&request);
        assert_eq!(rendered, "About braces {audience} {max_length} for potters.");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let request = ContentRequest::new(ContentType::Caption, "kilns", 20);
        let rendered = PromptTemplate::new("{greeting} {topic} {").render(&request);
        assert_eq!(rendered, "{greeting} kilns {");
    }
}
