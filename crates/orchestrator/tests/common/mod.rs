//! Shared fixtures for the orchestrator integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use generation::{
    ContentRequest, CostPerToken, GenerationProvider, ModelName, ProviderDescriptor,
    ProviderError, ProviderName, ProviderPrompt, QualityRating, QualityScore, QualityValidator,
    RawGeneration, TokenCount, ValidationOutcome,
};
use orchestrator::{
    BatchConfig, BatchEngine, Orchestrator, OrchestratorConfig, ProviderRouter, RouterConfig,
    TemplateCatalog,
};
use tokio_util::sync::CancellationToken;

/// Tracks how many calls are running at once and the highest value seen.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Provider with scripted latency, failures, and health.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    healthy: bool,
    delay: Duration,
    stagger: bool,
    failures_left: AtomicUsize,
    fail_after: Option<usize>,
    failure: fn() -> ProviderError,
    calls: AtomicUsize,
    in_flight: Arc<InFlight>,
}

impl ScriptedProvider {
    /// A healthy provider that answers immediately.
    pub fn new(name: &str, per_token: f64, rating: f64) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                name: ProviderName::new(name).unwrap(),
                model: ModelName::new(format!("{name}-model")).unwrap(),
                cost_per_token: CostPerToken::new(per_token, per_token).unwrap(),
                quality_rating: QualityRating::new(rating).unwrap(),
            },
            healthy: true,
            delay: Duration::ZERO,
            stagger: false,
            failures_left: AtomicUsize::new(0),
            fail_after: None,
            failure: || ProviderError::Transport("connection reset".into()),
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Every call fails with a transport error.
    pub fn failing(self) -> Self {
        self.failing_times(usize::MAX)
    }

    /// The first `n` calls fail with a transport error.
    pub fn failing_times(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// The first `n` calls succeed; every later call fails.
    pub fn failing_after(self, n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..self
        }
    }

    pub fn failing_with(self, failure: fn() -> ProviderError) -> Self {
        Self { failure, ..self }.failing()
    }

    pub fn unhealthy(self) -> Self {
        Self {
            healthy: false,
            ..self
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    /// Varies the delay per prompt so completion order differs from
    /// submission order.
    pub fn staggered(self, base: Duration) -> Self {
        Self {
            delay: base,
            stagger: true,
            ..self
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    fn delay_for(&self, prompt: &ProviderPrompt) -> Duration {
        if self.stagger {
            let factor = prompt.text.bytes().map(u32::from).sum::<u32>() % 5;
            self.delay * factor
        } else {
            self.delay
        }
    }

    fn take_failure(&self) -> Option<ProviderError> {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .ok()
            .map(|_| (self.failure)())
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn generate(
        &self,
        prompt: &ProviderPrompt,
        cancel: &CancellationToken,
    ) -> Result<RawGeneration, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.in_flight.enter();

        let delay = self.delay_for(prompt);
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if self.fail_after.is_some_and(|n| call > n) {
            return Err((self.failure)());
        }
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let headline = prompt.text.lines().next().unwrap_or_default();
        let text = if prompt.text.contains(REVISION_MARKER) {
            format!("revised {}: {headline}", self.descriptor.name)
        } else {
            format!("{}: {headline}", self.descriptor.name)
        };
        Ok(RawGeneration {
            text,
            tokens_in: TokenCount::new(100),
            tokens_out: TokenCount::new(50),
        })
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}

/// Text present in every corrective retry prompt.
pub const REVISION_MARKER: &str = "fell short of the quality bar";

/// Validator driven by a closure returning a score.
pub struct ScoringValidator<F> {
    score: F,
}

impl<F> ScoringValidator<F>
where
    F: Fn(&str, &ContentRequest) -> f64 + Send + Sync,
{
    pub fn new(score: F) -> Arc<Self> {
        Arc::new(Self { score })
    }
}

impl<F> QualityValidator for ScoringValidator<F>
where
    F: Fn(&str, &ContentRequest) -> f64 + Send + Sync,
{
    fn validate(&self, text: &str, request: &ContentRequest) -> ValidationOutcome {
        let score = QualityScore::saturating((self.score)(text, request));
        let issues = if score.as_f64() < 7.0 {
            vec![format!("Say more about {}.", request.topic)]
        } else {
            Vec::new()
        };
        ValidationOutcome::from_score(score, QualityScore::saturating(7.0), issues)
    }
}

/// Passes everything.
pub fn lenient() -> Arc<dyn QualityValidator> {
    ScoringValidator::new(|_: &str, _: &ContentRequest| 9.0)
}

/// Fails only requests whose topic starts with `weak`.
pub fn rejects_weak_topics() -> Arc<dyn QualityValidator> {
    ScoringValidator::new(|_: &str, request: &ContentRequest| {
        if request.topic.starts_with("weak") {
            4.0
        } else {
            9.0
        }
    })
}

pub fn router(providers: Vec<Arc<ScriptedProvider>>) -> Arc<ProviderRouter> {
    let providers = providers
        .into_iter()
        .map(|p| p as Arc<dyn GenerationProvider>)
        .collect();
    Arc::new(ProviderRouter::new(RouterConfig::default(), providers).unwrap())
}

pub fn pipeline(
    providers: Vec<Arc<ScriptedProvider>>,
    validator: Arc<dyn QualityValidator>,
) -> Orchestrator {
    pipeline_with(providers, validator, OrchestratorConfig::default())
}

pub fn pipeline_with(
    providers: Vec<Arc<ScriptedProvider>>,
    validator: Arc<dyn QualityValidator>,
    config: OrchestratorConfig,
) -> Orchestrator {
    Orchestrator::new(router(providers), validator, TemplateCatalog::builtin(), config)
}

pub fn engine(orchestrator: Orchestrator, config: BatchConfig) -> BatchEngine {
    BatchEngine::new(Arc::new(orchestrator), config)
}
