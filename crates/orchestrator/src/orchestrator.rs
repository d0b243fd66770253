//! Single-request generation pipeline.
//!
//! ```text
//! Building ─► Generating ─► Validating ─┬─► Finalized (success)
//!                                       └─► Retrying ─► Generating ─► Validating ─► Finalized (success | degraded)
//! any Generating step with every candidate failing ─► Failed
//! ```
//!
//! Transport failures advance through the router's failover chain until it is
//! exhausted. A failed quality gate triggers exactly one retry with a
//! corrective prompt; if that also fails, the better-scoring of the two
//! drafts is returned as a degraded result. Template and request-shape errors
//! are fatal and never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use generation::{
    AttemptPhase, ContentRequest, ContentResult, GenerationAttempt, GenerationError,
    ProviderError, ProviderName, ProviderPrompt, QualityValidator, RawGeneration, RoutingError,
    TokenCost, TokenCount, ValidationOutcome,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::router::{Candidate, ProviderRouter};
use crate::templates::{corrective_prompt, TemplateCatalog};

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Per-attempt limit; an attempt exceeding it is treated as a transport
    /// failure and triggers failover.
    pub attempt_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 60_000,
        }
    }
}

impl OrchestratorConfig {
    fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms.max(1))
    }
}

/// Pipeline stage, used for structured logging of state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Building,
    Generating,
    Validating,
    Retrying,
    Finalized,
    Failed,
}

/// A draft that reached the validator.
#[derive(Debug)]
struct Draft {
    text: String,
    provider: ProviderName,
    outcome: ValidationOutcome,
}

/// Why a generation pass produced no draft.
#[derive(Debug)]
enum PassFailure {
    Routing(RoutingError),
    Exhausted,
    Cancelled,
}

/// Runs the generation pipeline for one request at a time.
///
/// Holds no per-request state, so one instance is shared (`Arc`) by every
/// concurrent unit of a batch.
pub struct Orchestrator {
    router: Arc<ProviderRouter>,
    validator: Arc<dyn QualityValidator>,
    templates: TemplateCatalog,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Wires the pipeline's collaborators.
    pub fn new(
        router: Arc<ProviderRouter>,
        validator: Arc<dyn QualityValidator>,
        templates: TemplateCatalog,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            router,
            validator,
            templates,
            config,
        }
    }

    /// The router used for candidate acquisition.
    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    /// Generates content for `request`.
    pub async fn generate(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResult, GenerationError> {
        self.generate_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Generates content for `request`, aborting in-flight provider calls when
    /// `cancel` fires.
    #[instrument(
        name = "generate",
        skip_all,
        fields(
            request_id = %request.id,
            content_type = %request.content_type,
            strategy = %request.optimization_strategy,
        )
    )]
    pub async fn generate_with_cancel(
        &self,
        request: &ContentRequest,
        cancel: &CancellationToken,
    ) -> Result<ContentResult, GenerationError> {
        transition(Stage::Building);
        request.validate()?;
        let template = self.templates.resolve(request.content_type)?;
        let prompt = template.render(request);

        let mut attempts = Vec::new();

        // First pass. Routing failures here are fatal: nothing was generated.
        let first = match self
            .generate_draft(request, &prompt, AttemptPhase::Initial, &mut attempts, cancel)
            .await
        {
            Ok(draft) => draft,
            Err(failure) => {
                transition(Stage::Failed);
                return Err(fatal(failure, attempts));
            }
        };
        if first.outcome.passed {
            return Ok(finalize(request, first, attempts));
        }

        transition(Stage::Retrying);
        warn!(
            score = %first.outcome.score,
            issues = first.outcome.issues.len(),
            "quality gate failed; retrying with corrective prompt"
        );
        let retry_prompt = corrective_prompt(&prompt, &first.outcome.issues);
        let second = self
            .generate_draft(
                request,
                &retry_prompt,
                AttemptPhase::QualityRetry,
                &mut attempts,
                cancel,
            )
            .await;

        let chosen = match second {
            Ok(second) if second.outcome.passed => second,
            Ok(second) => {
                // Keep the better draft; the retry wins ties.
                if second.outcome.score >= first.outcome.score {
                    second
                } else {
                    first
                }
            }
            Err(PassFailure::Cancelled) => {
                transition(Stage::Failed);
                return Err(GenerationError::Cancelled { attempts });
            }
            Err(failure) => {
                warn!(
                    reason = ?failure,
                    "quality retry could not generate; returning first draft"
                );
                first
            }
        };
        Ok(finalize(request, chosen, attempts))
    }

    /// One generation pass: acquire candidates, walk the failover chain, and
    /// validate the first successful output.
    async fn generate_draft(
        &self,
        request: &ContentRequest,
        prompt: &str,
        phase: AttemptPhase,
        attempts: &mut Vec<GenerationAttempt>,
        cancel: &CancellationToken,
    ) -> Result<Draft, PassFailure> {
        let provider_prompt = ProviderPrompt {
            text: prompt.to_string(),
            max_output_tokens: TokenCount::estimate_for_words(request.max_length),
        };
        let candidates = self
            .router
            .candidates(request, &provider_prompt)
            .map_err(PassFailure::Routing)?;

        transition(Stage::Generating);
        for candidate in &candidates {
            if cancel.is_cancelled() {
                return Err(PassFailure::Cancelled);
            }
            let name = candidate.name().clone();
            let started = Instant::now();
            let outcome = self.call(candidate, &provider_prompt, cancel).await;
            let duration_ms = elapsed_ms(started);

            match outcome {
                Ok(raw) => {
                    self.router.record_success(&name);
                    let cost = candidate
                        .provider()
                        .estimate_cost(raw.tokens_in, raw.tokens_out);
                    attempts.push(succeeded_attempt(
                        phase,
                        prompt,
                        &raw,
                        cost,
                        &name,
                        duration_ms,
                    ));

                    transition(Stage::Validating);
                    let outcome = self.validator.validate(&raw.text, request);
                    debug!(
                        provider = %name,
                        score = %outcome.score,
                        passed = outcome.passed,
                        "draft validated"
                    );
                    return Ok(Draft {
                        text: raw.text,
                        provider: name,
                        outcome,
                    });
                }
                Err(ProviderError::Cancelled) => {
                    let err = ProviderError::Cancelled;
                    attempts.push(failed_attempt(phase, prompt, &name, duration_ms, &err));
                    return Err(PassFailure::Cancelled);
                }
                Err(err) => {
                    attempts.push(failed_attempt(phase, prompt, &name, duration_ms, &err));
                    let tripped = self.router.record_failure(&name, &err);
                    warn!(
                        provider = %name,
                        error = %err,
                        circuit_opened = tripped,
                        "attempt failed; failing over"
                    );
                }
            }
        }
        Err(PassFailure::Exhausted)
    }

    /// One adapter call, bounded by the attempt timeout and the cancellation
    /// signal.
    async fn call(
        &self,
        candidate: &Candidate,
        prompt: &ProviderPrompt,
        cancel: &CancellationToken,
    ) -> Result<RawGeneration, ProviderError> {
        let timeout = self.config.attempt_timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout(timeout, candidate.provider().generate(prompt, cancel)) => {
                result.unwrap_or(Err(ProviderError::Timeout(timeout)))
            }
        }
    }
}

fn transition(stage: Stage) {
    debug!(stage = ?stage, "pipeline stage");
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn succeeded_attempt(
    phase: AttemptPhase,
    prompt: &str,
    raw: &RawGeneration,
    cost: TokenCost,
    provider: &ProviderName,
    duration_ms: u64,
) -> GenerationAttempt {
    GenerationAttempt {
        phase,
        prompt: prompt.to_string(),
        raw_output: Some(raw.text.clone()),
        tokens_in: raw.tokens_in,
        tokens_out: raw.tokens_out,
        cost_usd: cost,
        provider_used: provider.clone(),
        duration_ms,
        error: None,
    }
}

fn failed_attempt(
    phase: AttemptPhase,
    prompt: &str,
    provider: &ProviderName,
    duration_ms: u64,
    error: &ProviderError,
) -> GenerationAttempt {
    GenerationAttempt {
        phase,
        prompt: prompt.to_string(),
        raw_output: None,
        tokens_in: TokenCount::default(),
        tokens_out: TokenCount::default(),
        cost_usd: TokenCost::zero(),
        provider_used: provider.clone(),
        duration_ms,
        error: Some(error.to_string()),
    }
}

fn fatal(failure: PassFailure, attempts: Vec<GenerationAttempt>) -> GenerationError {
    match failure {
        PassFailure::Routing(err) => GenerationError::NoProviderAvailable(err),
        PassFailure::Exhausted => GenerationError::GenerationExhausted { attempts },
        PassFailure::Cancelled => GenerationError::Cancelled { attempts },
    }
}

fn finalize(
    request: &ContentRequest,
    draft: Draft,
    attempts: Vec<GenerationAttempt>,
) -> ContentResult {
    transition(Stage::Finalized);
    let result = ContentResult {
        request_id: request.id,
        content: draft.text,
        quality_score: draft.outcome.score,
        cost_usd: attempts.iter().map(|a| a.cost_usd).sum(),
        provider_used: draft.provider,
        duration_ms: attempts.iter().map(|a| a.duration_ms).sum(),
        succeeded: draft.outcome.passed,
        issues: draft.outcome.issues,
        attempts,
    };
    if result.succeeded {
        info!(
            provider = %result.provider_used,
            score = %result.quality_score,
            cost = %result.cost_usd,
            attempts = result.attempts.len(),
            "content finalized"
        );
    } else {
        warn!(
            provider = %result.provider_used,
            score = %result.quality_score,
            cost = %result.cost_usd,
            attempts = result.attempts.len(),
            "content finalized below quality threshold"
        );
    }
    result
}
