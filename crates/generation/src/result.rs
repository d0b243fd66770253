//! Attempt log entries and the terminal per-request artefact.

use serde::{Deserialize, Serialize};

use crate::{ProviderName, QualityScore, RequestId, TokenCost, TokenCount};

/// Which pass of the pipeline an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    /// First pass with the template prompt.
    Initial,
    /// The single quality retry with the corrective prompt.
    QualityRetry,
}

/// Record of one provider call. Created once, appended to the request's
/// attempt log, and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// Pipeline pass.
    pub phase: AttemptPhase,
    /// Prompt sent.
    pub prompt: String,
    /// Generated text; `None` when the call failed.
    pub raw_output: Option<String>,
    /// Prompt tokens billed.
    pub tokens_in: TokenCount,
    /// Completion tokens billed.
    pub tokens_out: TokenCount,
    /// Cost of this call.
    pub cost_usd: TokenCost,
    /// Provider that served (or failed) the call.
    pub provider_used: ProviderName,
    /// Wall-clock duration of the call.
    pub duration_ms: u64,
    /// Failure description; `None` on success.
    pub error: Option<String>,
}

impl GenerationAttempt {
    /// Returns `true` if the provider returned text.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Terminal artefact for one request, created exactly once by the
/// orchestrator.
///
/// `succeeded == false` marks a degraded result: content was generated but
/// never passed the quality gate. Callers decide whether to accept it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentResult {
    /// Id of the originating request.
    pub request_id: RequestId,
    /// Chosen content.
    pub content: String,
    /// Validator score of the chosen content.
    pub quality_score: QualityScore,
    /// Sum of every attempt's cost.
    pub cost_usd: TokenCost,
    /// Provider that produced the chosen content.
    pub provider_used: ProviderName,
    /// Full attempt log, in call order.
    pub attempts: Vec<GenerationAttempt>,
    /// Whether the chosen content passed the quality gate.
    pub succeeded: bool,
    /// Validator issues for the chosen content (empty on a clean pass).
    pub issues: Vec<String>,
    /// Sum of every attempt's duration.
    pub duration_ms: u64,
}

impl ContentResult {
    /// Returns `true` for a degraded result.
    pub fn is_degraded(&self) -> bool {
        !self.succeeded
    }
}
