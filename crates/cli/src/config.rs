//! `contentgen.toml` loading and validation.
//!
//! Every section is optional and defaulted except `[[providers]]`, which must
//! list at least one provider. An invalid file stops the process before any
//! adapter is built.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, ensure, Context};
use generation::{ContentType, CostPerToken};
use orchestrator::health::MAX_OPEN_DURATION;
use orchestrator::{
    BatchConfig, OrchestratorConfig, PromptTemplate, RouterConfig, TemplateCatalog,
    ValidatorConfig,
};
use providers::ProviderSettings;
use serde::{Deserialize, Serialize};

/// Log output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable, for terminals.
    #[default]
    Pretty,
}

/// `[telemetry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub log_filter: String,
    pub log_format: LogFormat,
    /// OTLP gRPC collector endpoint; tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            log_format: LogFormat::default(),
            otlp_endpoint: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub router: RouterConfig,
    pub orchestrator: OrchestratorConfig,
    pub validator: ValidatorConfig,
    pub batch: BatchConfig,
    /// Per-content-type template overrides.
    pub templates: HashMap<ContentType, String>,
    pub providers: Vec<ProviderSettings>,
}

impl AppConfig {
    /// Reads and validates the file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parses and validates TOML text.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints the types cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.providers.is_empty(),
            "at least one [[providers]] entry is required"
        );

        let mut names = HashSet::new();
        for provider in &self.providers {
            let name = provider.name.as_str();
            ensure!(!name.trim().is_empty(), "provider names must not be blank");
            ensure!(
                names.insert(name),
                "provider '{name}' is configured more than once"
            );
            ensure!(
                !provider.model.as_str().trim().is_empty(),
                "provider '{name}': model must not be blank"
            );
            let rates = provider.cost_per_token;
            if CostPerToken::new(rates.input, rates.output).is_none() {
                bail!("provider '{name}': cost_per_token rates must be finite and non-negative");
            }
        }

        ensure!(
            (0.0..=10.0).contains(&self.router.minimum_quality_floor),
            "router.minimum_quality_floor must be within [0, 10]"
        );
        ensure!(
            self.router.circuit_breaker.failure_threshold >= 1,
            "router.failure_threshold must be at least 1"
        );
        let max_ms = u64::try_from(MAX_OPEN_DURATION.as_millis()).unwrap_or(u64::MAX);
        ensure!(
            self.router.circuit_breaker.failure_window_ms <= max_ms,
            "router.failure_window_ms must not exceed {max_ms}"
        );
        ensure!(
            self.router.circuit_breaker.cooldown_ms <= max_ms,
            "router.cooldown_ms must not exceed {max_ms}"
        );
        ensure!(
            (0.0..=10.0).contains(&self.validator.quality_threshold),
            "validator.quality_threshold must be within [0, 10]"
        );
        ensure!(
            self.orchestrator.attempt_timeout_ms > 0,
            "orchestrator.attempt_timeout_ms must be positive"
        );
        for (content_type, body) in &self.templates {
            ensure!(
                !body.trim().is_empty(),
                "templates.{content_type} must not be blank"
            );
        }
        Ok(())
    }

    /// Built-in templates with the configured overrides applied.
    pub fn template_catalog(&self) -> TemplateCatalog {
        self.templates
            .iter()
            .fold(TemplateCatalog::builtin(), |catalog, (content_type, body)| {
                catalog.with_template(*content_type, PromptTemplate::new(body.as_str()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation::ContentRequest;
    use providers::ProviderKind;

    const SAMPLE: &str = r#"
[telemetry]
log_filter = "contentgen=debug,info"
log_format = "json"

[router]
minimum_quality_floor = 6.5
failure_threshold = 5
cooldown_ms = 10000

[orchestrator]
attempt_timeout_ms = 30000

[validator]
quality_threshold = 7.5

[batch]
default_max_concurrency = 8
batch_timeout_ms = 600000

[templates]
caption = "Caption for {topic}."

[[providers]]
name = "claude"
kind = "anthropic"
model = "claude-sonnet-4-5"
cost_per_token = { input = 0.000003, output = 0.000015 }
quality_rating = 9.0

[[providers]]
name = "local"
kind = "openai"
model = "llama3"
base_url = "http://localhost:11434/v1"
cost_per_token = { input = 0.0, output = 0.0 }
quality_rating = 6.0
"#;

    const MOCK: &str = r#"
[[providers]]
name = "mock"
kind = "mock"
model = "mock-1"
cost_per_token = { input = 0.0, output = 0.0 }
quality_rating = 5.0
"#;

    #[test]
    fn sample_config_parses() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.router.minimum_quality_floor, 6.5);
        assert_eq!(config.router.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.router.circuit_breaker.failure_window_ms, 60_000);
        assert_eq!(config.router.circuit_breaker.cooldown_ms, 10_000);
        assert_eq!(config.orchestrator.attempt_timeout_ms, 30_000);
        assert_eq!(config.batch.default_concurrency().get(), 8);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].kind, ProviderKind::Openai);
    }

    #[test]
    fn omitted_sections_take_defaults() {
        let config = AppConfig::parse(MOCK).unwrap();
        assert_eq!(config.telemetry, TelemetryConfig::default());
        assert_eq!(config.router, RouterConfig::default());
        assert_eq!(config.validator.quality_threshold, 7.0);
        assert_eq!(config.batch.default_concurrency().get(), 4);
        assert!(config.batch.batch_timeout_ms.is_none());
    }

    #[test]
    fn template_overrides_are_applied() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        let catalog = config.template_catalog();
        let request = ContentRequest::new(ContentType::Caption, "kites", 20);
        assert_eq!(
            catalog.resolve(ContentType::Caption).unwrap().render(&request),
            "Caption for kites."
        );
        assert!(catalog.resolve(ContentType::BlogPost).is_ok());
    }

    #[test]
    fn no_providers_is_rejected() {
        let err = AppConfig::parse("[router]\nminimum_quality_floor = 5.0\n").unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn duplicate_provider_names_are_rejected() {
        let text = format!("{MOCK}{MOCK}");
        let err = AppConfig::parse(&text).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn negative_costs_are_rejected() {
        let text = MOCK.replace("input = 0.0", "input = -1.0");
        let err = AppConfig::parse(&text).unwrap_err();
        assert!(err.to_string().contains("cost_per_token"));
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let text = MOCK.replace("quality_rating = 5.0", "quality_rating = 11.0");
        assert!(AppConfig::parse(&text).is_err());
    }

    #[test]
    fn unknown_content_type_in_templates_is_rejected() {
        let text = format!("[templates]\nlimerick = \"x\"\n{MOCK}");
        assert!(AppConfig::parse(&text).is_err());
    }

    #[test]
    fn unbounded_cooldown_is_rejected() {
        let text = format!("[router]\ncooldown_ms = 9223372036854775807\n{MOCK}");
        let err = AppConfig::parse(&text).unwrap_err();
        assert!(err.to_string().contains("cooldown_ms"));
    }
}
