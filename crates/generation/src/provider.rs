//! Provider port: the uniform capability interface every generation backend
//! is wrapped behind.
//!
//! Concrete adapters live in the `providers` crate. This crate sees only
//! [`GenerationProvider`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    CostPerToken, ModelName, ProviderError, ProviderName, QualityRating, TokenCost, TokenCount,
};

/// Static description of a configured provider.
///
/// Availability is not stored here: it is owned by the router's
/// health tracker and reported through [`ProviderStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Registry key.
    pub name: ProviderName,
    /// Backend model.
    pub model: ModelName,
    /// Per-token pricing.
    pub cost_per_token: CostPerToken,
    /// Static rating used for ranking.
    pub quality_rating: QualityRating,
}

/// Prompt handed to an adapter for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPrompt {
    /// Fully assembled prompt text.
    pub text: String,
    /// Completion budget the adapter should request from its backend.
    pub max_output_tokens: TokenCount,
}

/// Successful raw output of one adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGeneration {
    /// Generated text.
    pub text: String,
    /// Prompt tokens billed by the provider.
    pub tokens_in: TokenCount,
    /// Completion tokens billed by the provider.
    pub tokens_out: TokenCount,
}

/// Uniform capability interface over one external text-generation backend.
///
/// Implementations must be cheap to share (`Arc<dyn GenerationProvider>`) and
/// safe to call from many concurrent requests.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Static description used for routing and reporting.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Performs one generation call.
    ///
    /// Implementations must stop work and return
    /// [`ProviderError::Cancelled`] promptly once `cancel` fires, aborting the
    /// underlying network call.
    async fn generate(
        &self,
        prompt: &ProviderPrompt,
        cancel: &CancellationToken,
    ) -> Result<RawGeneration, ProviderError>;

    /// Cost of a call with the given token usage.
    fn estimate_cost(&self, tokens_in: TokenCount, tokens_out: TokenCount) -> TokenCost {
        self.descriptor().cost_per_token.cost_of(tokens_in, tokens_out)
    }

    /// Static self-check (e.g. credentials present). Unhealthy adapters are
    /// never offered as candidates.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Convenience accessor for the registry key.
    fn name(&self) -> &ProviderName {
        &self.descriptor().name
    }
}

/// One row of the provider status query consumed by ops tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Registry key.
    pub name: ProviderName,
    /// Backend model.
    pub model: ModelName,
    /// Static rating.
    pub quality_rating: QualityRating,
    /// Whether the router would currently offer this provider.
    pub available: bool,
    /// Failures recorded inside the current rolling window.
    pub rolling_failures: u32,
}
