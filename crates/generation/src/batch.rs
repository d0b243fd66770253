//! Batch value types: concurrency bound, lifecycle state, per-slot outcome,
//! and the aggregated report.

use serde::{Deserialize, Serialize};

use crate::{
    BatchId, ContentResult, GenerationAttempt, GenerationError, RequestValidationError, Timestamp,
    TokenCost,
};

// ---------------------------------------------------------------------------
// Concurrency bound
// ---------------------------------------------------------------------------

/// Maximum number of requests in flight at once within a batch.
///
/// Always at least one: a misconfigured value of zero or less is corrected to
/// one rather than treated as unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct MaxConcurrency(usize);

impl MaxConcurrency {
    /// Normalises a caller-supplied value.
    pub fn new(requested: i64) -> Self {
        Self(usize::try_from(requested).unwrap_or(0).max(1))
    }

    /// Returns the bound as a `usize` (never zero).
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for MaxConcurrency {
    fn default() -> Self {
        Self(1)
    }
}

impl From<i64> for MaxConcurrency {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<MaxConcurrency> for i64 {
    fn from(value: MaxConcurrency) -> Self {
        i64::try_from(value.0).unwrap_or(i64::MAX)
    }
}

impl std::fmt::Display for MaxConcurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of a batch job. Transitions only move forward:
/// `Pending → Running → Completed | PartiallyFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Accepted, nothing dispatched yet.
    Pending,
    /// Units of work are in flight.
    Running,
    /// Every slot ended succeeded or degraded.
    Completed,
    /// At least one slot failed or was cancelled.
    PartiallyFailed,
}

impl BatchState {
    /// Returns `true` for `Completed` and `PartiallyFailed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyFailed)
    }
}

// ---------------------------------------------------------------------------
// Per-slot outcome
// ---------------------------------------------------------------------------

/// Final state of one batch slot. Every request ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Content passed the quality gate.
    Succeeded {
        /// The request's result.
        result: ContentResult,
    },
    /// Content generated but never passed the quality gate.
    Degraded {
        /// The request's result.
        result: ContentResult,
    },
    /// The request hit a fatal error.
    Failed {
        /// Machine-readable classification (see [`GenerationError::kind`]).
        kind: String,
        /// Human-readable error.
        error: String,
        /// Attempts made before the failure.
        attempts: Vec<GenerationAttempt>,
    },
    /// The batch was cancelled before this slot finished.
    Cancelled {
        /// `false` when the slot never started.
        dispatched: bool,
        /// Attempts made before the signal arrived.
        attempts: Vec<GenerationAttempt>,
    },
}

impl BatchOutcome {
    /// Maps one orchestrator return value to a slot outcome.
    pub fn from_generation(outcome: Result<ContentResult, GenerationError>) -> Self {
        match outcome {
            Ok(result) if result.succeeded => Self::Succeeded { result },
            Ok(result) => Self::Degraded { result },
            Err(GenerationError::Cancelled { attempts }) => Self::Cancelled {
                dispatched: true,
                attempts,
            },
            Err(err) => Self::Failed {
                kind: err.kind().to_string(),
                error: err.to_string(),
                attempts: err.attempts().to_vec(),
            },
        }
    }

    /// A slot whose entry was rejected before dispatch.
    pub fn rejected(err: RequestValidationError) -> Self {
        Self::from_generation(Err(GenerationError::InvalidRequest(err)))
    }

    /// A slot that was never dispatched because the batch was cancelled.
    pub fn not_started() -> Self {
        Self::Cancelled {
            dispatched: false,
            attempts: Vec::new(),
        }
    }

    /// Spend attributable to this slot, including failed attempts.
    pub fn cost(&self) -> TokenCost {
        match self {
            Self::Succeeded { result } | Self::Degraded { result } => result.cost_usd,
            Self::Failed { attempts, .. } | Self::Cancelled { attempts, .. } => {
                attempts.iter().map(|a| a.cost_usd).sum()
            }
        }
    }

    /// The content result, for succeeded and degraded slots.
    pub fn result(&self) -> Option<&ContentResult> {
        match self {
            Self::Succeeded { result } | Self::Degraded { result } => Some(result),
            Self::Failed { .. } | Self::Cancelled { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Aggregated outcome of a batch. `results[i]` always corresponds to
/// `requests[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Job identity.
    pub batch_id: BatchId,
    /// Terminal lifecycle state.
    pub state: BatchState,
    /// One outcome per request, index-aligned with the input.
    pub results: Vec<BatchOutcome>,
    /// Slots that passed the quality gate.
    pub succeeded_count: usize,
    /// Slots that hit a fatal error.
    pub failed_count: usize,
    /// Slots with sub-threshold content.
    pub degraded_count: usize,
    /// Slots cut short by cancellation.
    pub cancelled_count: usize,
    /// Spend across every slot.
    pub total_cost_usd: TokenCost,
    /// When the job started running.
    pub started_at: Timestamp,
    /// When the last slot settled.
    pub finished_at: Timestamp,
}

impl BatchReport {
    /// Aggregates index-aligned outcomes into a report.
    pub fn from_outcomes(
        batch_id: BatchId,
        results: Vec<BatchOutcome>,
        started_at: Timestamp,
    ) -> Self {
        let mut report = Self {
            batch_id,
            state: BatchState::Completed,
            succeeded_count: 0,
            failed_count: 0,
            degraded_count: 0,
            cancelled_count: 0,
            total_cost_usd: results.iter().map(BatchOutcome::cost).sum(),
            results: Vec::new(),
            started_at,
            finished_at: Timestamp::now(),
        };
        for outcome in &results {
            match outcome {
                BatchOutcome::Succeeded { .. } => report.succeeded_count += 1,
                BatchOutcome::Degraded { .. } => report.degraded_count += 1,
                BatchOutcome::Failed { .. } => report.failed_count += 1,
                BatchOutcome::Cancelled { .. } => report.cancelled_count += 1,
            }
        }
        if report.failed_count + report.cancelled_count > 0 {
            report.state = BatchState::PartiallyFailed;
        }
        report.results = results;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProviderName, QualityScore, RequestId};

    fn result(succeeded: bool, cost: f64) -> ContentResult {
        ContentResult {
            request_id: RequestId::new_random(),
            content: "text".into(),
            quality_score: QualityScore::new(if succeeded { 9.0 } else { 4.0 }).unwrap(),
            cost_usd: TokenCost::new(cost).unwrap(),
            provider_used: ProviderName::new("p").unwrap(),
            attempts: Vec::new(),
            succeeded,
            issues: Vec::new(),
            duration_ms: 1,
        }
    }

    #[test]
    fn max_concurrency_is_never_zero() {
        assert_eq!(MaxConcurrency::new(0).get(), 1);
        assert_eq!(MaxConcurrency::new(-5).get(), 1);
        assert_eq!(MaxConcurrency::new(8).get(), 8);
        let parsed: MaxConcurrency = serde_json::from_str("-2").unwrap();
        assert_eq!(parsed.get(), 1);
    }

    #[test]
    fn report_counts_each_outcome_kind() {
        let outcomes = vec![
            BatchOutcome::from_generation(Ok(result(true, 0.25))),
            BatchOutcome::from_generation(Ok(result(false, 0.5))),
            BatchOutcome::from_generation(Err(GenerationError::GenerationExhausted {
                attempts: Vec::new(),
            })),
            BatchOutcome::not_started(),
        ];
        let report = BatchReport::from_outcomes(BatchId::new_random(), outcomes, Timestamp::now());

        assert_eq!(report.results.len(), 4);
        assert_eq!(report.succeeded_count, 1);
        assert_eq!(report.degraded_count, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.cancelled_count, 1);
        assert_eq!(report.state, BatchState::PartiallyFailed);
        assert!((report.total_cost_usd.as_f64() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn degraded_only_batch_is_completed() {
        let outcomes = vec![BatchOutcome::from_generation(Ok(result(false, 0.1)))];
        let report = BatchReport::from_outcomes(BatchId::new_random(), outcomes, Timestamp::now());
        assert_eq!(report.state, BatchState::Completed);
    }

    #[test]
    fn outcomes_serialise_with_status_tag() {
        let json = serde_json::to_value(BatchOutcome::not_started()).unwrap();
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["dispatched"], false);
    }
}
