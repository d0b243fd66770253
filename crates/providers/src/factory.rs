//! Adapter construction from configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use generation::{
    CostPerToken, GenerationProvider, ModelName, ProviderDescriptor, ProviderName, QualityRating,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{AnthropicProvider, MockProvider, OpenAiProvider};

/// Which adapter implementation backs a configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API or a compatible local server.
    #[serde(alias = "openai_compatible")]
    Openai,
    /// Offline deterministic mock.
    Mock,
}

impl ProviderKind {
    /// Environment variable consulted when `api_key_env` is not configured.
    fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Openai | Self::Mock => None,
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registry key, unique across the configuration.
    pub name: ProviderName,
    /// Adapter implementation.
    pub kind: ProviderKind,
    /// Backend model identifier.
    pub model: ModelName,
    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Overrides the adapter's default endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-token pricing in USD.
    pub cost_per_token: CostPerToken,
    /// Static quality rating used for routing.
    pub quality_rating: QualityRating,
    /// HTTP client timeout (remote adapters only).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Simulated latency (mock adapter only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

impl ProviderSettings {
    /// The static descriptor shared by every adapter kind.
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: self.name.clone(),
            model: self.model.clone(),
            cost_per_token: self.cost_per_token,
            quality_rating: self.quality_rating,
        }
    }

    /// Resolves the API key from the environment.
    pub fn credential(&self) -> Credential {
        let env_var = self
            .api_key_env
            .clone()
            .or_else(|| self.kind.default_api_key_env().map(String::from));
        match env_var {
            None => Credential::NotRequired,
            Some(env_var) => match std::env::var(&env_var) {
                Ok(key) if !key.trim().is_empty() => Credential::Present(key.trim().to_string()),
                _ => Credential::Missing { env_var },
            },
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

/// API key state of one adapter.
///
/// An adapter with a missing key is still registered but reports itself
/// unhealthy, so the router never offers it.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// The backend accepts unauthenticated calls (e.g. a local server).
    NotRequired,
    /// A key is required but the environment variable is unset or blank.
    Missing {
        /// Variable that was consulted.
        env_var: String,
    },
    /// The resolved key.
    Present(String),
}

impl Credential {
    /// The key, when present.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Present(key) => Some(key),
            Self::NotRequired | Self::Missing { .. } => None,
        }
    }

    /// `false` only when a required key is missing.
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Missing { .. })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRequired => f.write_str("NotRequired"),
            Self::Missing { env_var } => f.debug_struct("Missing").field("env_var", env_var).finish(),
            Self::Present(_) => f.write_str("Present(<redacted>)"),
        }
    }
}

/// An adapter could not be constructed.
#[derive(Debug, Error)]
pub enum ProviderSetupError {
    /// The HTTP client could not be initialised.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// A credential or setting cannot be sent as an HTTP header.
    #[error("provider '{provider}': invalid header value for '{header}'")]
    InvalidHeader {
        /// Provider being constructed.
        provider: ProviderName,
        /// Offending header.
        header: &'static str,
    },
}

/// Builds the adapter described by `settings`.
pub fn build_provider(
    settings: &ProviderSettings,
) -> Result<Arc<dyn GenerationProvider>, ProviderSetupError> {
    let descriptor = settings.descriptor();
    let credential = settings.credential();
    if let Credential::Missing { env_var } = &credential {
        warn!(
            provider = %settings.name,
            env_var = %env_var,
            "API key not set; provider will be reported unavailable"
        );
    }

    let provider: Arc<dyn GenerationProvider> = match settings.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            descriptor,
            credential,
            settings.base_url.as_deref(),
            settings.request_timeout(),
        )?),
        ProviderKind::Openai => Arc::new(OpenAiProvider::new(
            descriptor,
            credential,
            settings.base_url.as_deref(),
            settings.request_timeout(),
        )?),
        ProviderKind::Mock => {
            let mock = MockProvider::new(descriptor);
            Arc::new(match settings.latency_ms {
                Some(ms) => mock.with_latency(Duration::from_millis(ms)),
                None => mock,
            })
        }
    };
    info!(
        provider = %settings.name,
        kind = ?settings.kind,
        model = %settings.model,
        "provider registered"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: ProviderKind, api_key_env: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            name: ProviderName::new("p").unwrap(),
            kind,
            model: ModelName::new("m").unwrap(),
            api_key_env: api_key_env.map(String::from),
            base_url: None,
            cost_per_token: CostPerToken::new(0.000001, 0.000002).unwrap(),
            quality_rating: QualityRating::new(8.0).unwrap(),
            request_timeout_ms: 1_000,
            latency_ms: None,
        }
    }

    #[test]
    fn missing_key_marks_adapter_unhealthy() {
        let settings = settings(
            ProviderKind::Openai,
            Some("CONTENTGEN_TEST_KEY_THAT_IS_NEVER_SET"),
        );
        assert!(matches!(settings.credential(), Credential::Missing { .. }));
        let provider = build_provider(&settings).unwrap();
        assert!(!provider.is_healthy());
    }

    #[test]
    fn openai_without_key_env_needs_no_key() {
        let settings = settings(ProviderKind::Openai, None);
        assert_eq!(settings.credential(), Credential::NotRequired);
        assert!(build_provider(&settings).unwrap().is_healthy());
    }

    #[test]
    fn mock_is_always_healthy() {
        let provider = build_provider(&settings(ProviderKind::Mock, None)).unwrap();
        assert!(provider.is_healthy());
        assert_eq!(provider.name().as_str(), "p");
    }

    #[test]
    fn credential_debug_never_prints_the_key() {
        let shown = format!("{:?}", Credential::Present("sk-secret".into()));
        assert!(!shown.contains("sk-secret"));
    }

    #[test]
    fn settings_deserialize_from_toml_shaped_json() {
        let settings: ProviderSettings = serde_json::from_value(serde_json::json!({
            "name": "claude",
            "kind": "anthropic",
            "model": "claude-sonnet-4-5",
            "cost_per_token": { "input": 0.000003, "output": 0.000015 },
            "quality_rating": 9.0
        }))
        .unwrap();
        assert_eq!(settings.kind, ProviderKind::Anthropic);
        assert_eq!(settings.request_timeout_ms, 120_000);
        assert!(settings.api_key_env.is_none());
    }
}
