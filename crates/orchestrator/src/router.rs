//! Provider registry and router.
//!
//! The router owns every configured adapter, keyed by [`ProviderName`] and
//! resolved once at construction. For each request it produces an ordered
//! candidate list: the primary provider first, then the failover chain.
//!
//! ## Ranking
//!
//! | Strategy | Order | Tie-break |
//! |----------|-------|-----------|
//! | `cost_optimized` | estimated cost ascending, after dropping providers below the quality floor | higher rating |
//! | `quality_first` | rating descending | lower cost |
//! | `balanced` | `rating / (cost + ε)` descending | name |
//!
//! Remaining ties fall back to provider name so the order is fully
//! deterministic for a given health state.
//!
//! A pinned `provider_override` bypasses ranking, budget, and failover: it is
//! the only candidate, and the request fails outright if it is unavailable.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use generation::{
    ContentRequest, GenerationProvider, OptimizationStrategy, ProviderError, ProviderName,
    ProviderPrompt, ProviderStatus, RoutingError, TokenCost, TokenCount,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::health::{CircuitBreakerConfig, HealthTracker};

/// Keeps the balanced score finite for free providers.
const BALANCED_EPSILON: f64 = 1e-6;

/// Router tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Minimum provider rating considered by `cost_optimized` routing.
    pub minimum_quality_floor: f64,
    /// Circuit-breaker settings.
    #[serde(flatten)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            minimum_quality_floor: 6.0,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A provider offered for one request, with its estimated cost.
#[derive(Clone)]
pub struct Candidate {
    provider: Arc<dyn GenerationProvider>,
    estimated_cost: TokenCost,
}

impl Candidate {
    /// The adapter to call.
    pub fn provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.provider
    }

    /// Registry key of the adapter.
    pub fn name(&self) -> &ProviderName {
        self.provider.name()
    }

    /// Estimated cost of one attempt with this provider.
    pub fn estimated_cost(&self) -> TokenCost {
        self.estimated_cost
    }

    fn rating(&self) -> f64 {
        self.provider.descriptor().quality_rating.as_f64()
    }

    fn cost(&self) -> f64 {
        self.estimated_cost.as_f64()
    }

    fn value(&self) -> f64 {
        self.rating() / (self.cost() + BALANCED_EPSILON)
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("provider", self.name())
            .field("estimated_cost", &self.estimated_cost)
            .finish()
    }
}

fn rank(candidates: &mut Vec<Candidate>, strategy: OptimizationStrategy, quality_floor: f64) {
    let by_name = |a: &Candidate, b: &Candidate| a.name().cmp(b.name());
    match strategy {
        OptimizationStrategy::CostOptimized => {
            candidates.retain(|c| c.rating() >= quality_floor);
            candidates.sort_by(|a, b| {
                a.cost()
                    .total_cmp(&b.cost())
                    .then_with(|| b.rating().total_cmp(&a.rating()))
                    .then_with(|| by_name(a, b))
            });
        }
        OptimizationStrategy::QualityFirst => candidates.sort_by(|a, b| {
            b.rating()
                .total_cmp(&a.rating())
                .then_with(|| a.cost().total_cmp(&b.cost()))
                .then_with(|| by_name(a, b))
        }),
        OptimizationStrategy::Balanced => candidates.sort_by(|a, b| {
            b.value()
                .total_cmp(&a.value())
                .then_with(|| by_name(a, b))
        }),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Registry of adapters plus routing and health tracking.
///
/// Constructed once and shared (`Arc<ProviderRouter>`) by the orchestrator
/// and the batch engine.
pub struct ProviderRouter {
    providers: Vec<Arc<dyn GenerationProvider>>,
    index: HashMap<ProviderName, usize>,
    health: HealthTracker,
    config: RouterConfig,
}

impl ProviderRouter {
    /// Builds the registry. Fails on an empty provider list or duplicate
    /// names.
    pub fn new(
        config: RouterConfig,
        providers: Vec<Arc<dyn GenerationProvider>>,
    ) -> Result<Self, RoutingError> {
        if providers.is_empty() {
            return Err(RoutingError::EmptyRegistry);
        }
        let mut index = HashMap::with_capacity(providers.len());
        for (position, provider) in providers.iter().enumerate() {
            if index.insert(provider.name().clone(), position).is_some() {
                return Err(RoutingError::DuplicateProvider {
                    provider: provider.name().clone(),
                });
            }
        }
        Ok(Self {
            health: HealthTracker::new(config.circuit_breaker.clone()),
            providers,
            index,
            config,
        })
    }

    /// Looks up an adapter by registry key.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn GenerationProvider>> {
        let key = ProviderName::new(name)?;
        self.index.get(&key).map(|&i| &self.providers[i])
    }

    /// Registered adapters, in registration order.
    pub fn providers(&self) -> &[Arc<dyn GenerationProvider>] {
        &self.providers
    }

    /// Returns `true` when the adapter is healthy and its circuit is closed.
    pub fn is_available(&self, provider: &dyn GenerationProvider) -> bool {
        provider.is_healthy() && self.health.is_available(provider.name())
    }

    /// Ordered candidate list for `request`, given the assembled prompt.
    pub fn candidates(
        &self,
        request: &ContentRequest,
        prompt: &ProviderPrompt,
    ) -> Result<Vec<Candidate>, RoutingError> {
        let tokens_in = TokenCount::estimate_for_text(&prompt.text);
        let tokens_out = prompt.max_output_tokens;
        let candidate = |provider: &Arc<dyn GenerationProvider>| Candidate {
            estimated_cost: provider.estimate_cost(tokens_in, tokens_out),
            provider: Arc::clone(provider),
        };

        if let Some(pinned) = request.pinned_provider() {
            let provider = self
                .get(pinned.as_str())
                .ok_or_else(|| RoutingError::UnknownProvider {
                    provider: pinned.to_string(),
                })?;
            if !self.is_available(provider.as_ref()) {
                return Err(RoutingError::ProviderUnavailable { provider: pinned });
            }
            debug!(provider = %pinned, "using pinned provider");
            return Ok(vec![candidate(provider)]);
        }

        let mut candidates: Vec<Candidate> = self
            .providers
            .iter()
            .filter(|p| self.is_available(p.as_ref()))
            .map(candidate)
            .filter(|c| {
                request
                    .budget_usd
                    .map_or(true, |budget| !budget.is_exceeded_by(c.estimated_cost))
            })
            .collect();
        rank(
            &mut candidates,
            request.optimization_strategy,
            self.config.minimum_quality_floor,
        );

        if candidates.is_empty() {
            return Err(RoutingError::NoProviderAvailable {
                strategy: request.optimization_strategy.to_string(),
            });
        }
        debug!(
            strategy = %request.optimization_strategy,
            order = ?candidates.iter().map(|c| c.name().as_str()).collect::<Vec<_>>(),
            "ranked candidates"
        );
        Ok(candidates)
    }

    /// Reports a successful call to the health tracker.
    pub fn record_success(&self, provider: &ProviderName) {
        self.health.record_success(provider);
    }

    /// Reports a failed call to the health tracker. Returns `true` if the
    /// failure opened the provider's circuit.
    pub fn record_failure(&self, provider: &ProviderName, error: &ProviderError) -> bool {
        self.health.record_failure(provider, &error.retry_policy())
    }

    /// Current status of every provider, in registration order.
    pub fn status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| {
                let descriptor = p.descriptor();
                ProviderStatus {
                    name: descriptor.name.clone(),
                    model: descriptor.model.clone(),
                    quality_rating: descriptor.quality_rating,
                    available: self.is_available(p.as_ref()),
                    rolling_failures: self.health.rolling_failures(&descriptor.name),
                }
            })
            .collect()
    }
}

impl fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRouter")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}
