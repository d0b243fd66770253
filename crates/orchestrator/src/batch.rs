//! Batch execution engine.
//!
//! A batch is N independent orchestrator invocations under one counting
//! semaphore. Every request gets its own task and its own result slot;
//! slot `i` always holds the outcome of request `i`, whatever order the tasks
//! finish in.
//!
//! ## Cancellation
//!
//! A batch-level signal (explicit token or `batch_timeout_ms`) fires a child
//! token shared by all tasks:
//!
//! - tasks still waiting for a permit never dispatch and report
//!   `cancelled { dispatched: false }`;
//! - in-flight provider calls are aborted and report
//!   `cancelled { dispatched: true }`;
//! - already-settled slots keep their results.

use std::sync::Arc;
use std::time::Duration;

use generation::{
    BatchId, BatchOutcome, BatchReport, BatchState, ContentRequest, MaxConcurrency,
    RequestValidationError, Timestamp,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn, Instrument};

use crate::orchestrator::Orchestrator;

/// Batch tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrency used when the caller does not supply one.
    pub default_max_concurrency: i64,
    /// Whole-batch deadline; unset means no deadline.
    pub batch_timeout_ms: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_max_concurrency: 4,
            batch_timeout_ms: None,
        }
    }
}

impl BatchConfig {
    /// The configured default, normalised.
    pub fn default_concurrency(&self) -> MaxConcurrency {
        MaxConcurrency::new(self.default_max_concurrency)
    }

    fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A batch and its index-aligned result slots.
///
/// Entries that could not be turned into a request are settled as failed
/// slots when the job is built and are never dispatched. Only the engine
/// moves the job through its lifecycle; [`BatchJob::state`] reflects the
/// terminal state once [`BatchEngine::run_job`] returns.
#[derive(Debug)]
pub struct BatchJob {
    id: BatchId,
    entries: Vec<Result<ContentRequest, RequestValidationError>>,
    max_concurrency: MaxConcurrency,
    state: BatchState,
    results: Vec<Option<BatchOutcome>>,
}

impl BatchJob {
    /// Creates a pending job.
    pub fn new(requests: Vec<ContentRequest>, max_concurrency: MaxConcurrency) -> Self {
        Self::from_entries(requests.into_iter().map(Ok).collect(), max_concurrency)
    }

    /// Creates a pending job from entries decoded one by one; rejected
    /// entries occupy their slot as validation failures.
    pub fn from_entries(
        entries: Vec<Result<ContentRequest, RequestValidationError>>,
        max_concurrency: MaxConcurrency,
    ) -> Self {
        let results = entries
            .iter()
            .map(|entry| match entry {
                Ok(_) => None,
                Err(err) => Some(BatchOutcome::rejected(err.clone())),
            })
            .collect();
        Self {
            id: BatchId::new_random(),
            entries,
            max_concurrency,
            state: BatchState::Pending,
            results,
        }
    }

    /// Job identity.
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Number of slots, rejected entries included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` for a batch with no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The concurrency bound.
    pub fn max_concurrency(&self) -> MaxConcurrency {
        self.max_concurrency
    }

    /// Semaphore permits: never more than there are slots to run, and never
    /// more than the semaphore can hold.
    fn permits(&self) -> usize {
        self.max_concurrency
            .get()
            .min(self.len().max(1))
            .min(Semaphore::MAX_PERMITS)
    }

    fn start(&mut self) {
        debug_assert_eq!(self.state, BatchState::Pending);
        self.state = BatchState::Running;
    }

    fn record(&mut self, index: usize, outcome: BatchOutcome) {
        debug_assert!(self.results[index].is_none(), "slot {index} written twice");
        self.results[index] = Some(outcome);
    }

    fn finish(&mut self, started_at: Timestamp) -> BatchReport {
        let outcomes = std::mem::take(&mut self.results)
            .into_iter()
            .map(|slot| slot.unwrap_or_else(BatchOutcome::not_started))
            .collect();
        let report = BatchReport::from_outcomes(self.id, outcomes, started_at);
        self.state = report.state;
        report
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Fans requests out to the orchestrator under a concurrency bound and
/// aggregates the outcomes.
pub struct BatchEngine {
    orchestrator: Arc<Orchestrator>,
    config: BatchConfig,
}

impl BatchEngine {
    /// Creates an engine over a shared orchestrator.
    pub fn new(orchestrator: Arc<Orchestrator>, config: BatchConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Engine settings.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Runs `requests` with at most `max_concurrency` in flight.
    pub async fn run_batch(
        &self,
        requests: Vec<ContentRequest>,
        max_concurrency: MaxConcurrency,
    ) -> BatchReport {
        self.run_batch_with_cancel(requests, max_concurrency, &CancellationToken::new())
            .await
    }

    /// Like [`BatchEngine::run_batch`], stopping early when `cancel` fires.
    pub async fn run_batch_with_cancel(
        &self,
        requests: Vec<ContentRequest>,
        max_concurrency: MaxConcurrency,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut job = BatchJob::new(requests, max_concurrency);
        self.run_job(&mut job, cancel).await
    }

    /// Drives a prepared job to its terminal state.
    #[instrument(
        name = "batch",
        skip_all,
        fields(
            batch_id = %job.id(),
            size = job.len(),
            max_concurrency = %job.max_concurrency(),
        )
    )]
    pub async fn run_job(&self, job: &mut BatchJob, cancel: &CancellationToken) -> BatchReport {
        let started_at = Timestamp::now();
        job.start();
        info!("batch started");

        // Child token: a timeout here must not cancel the caller's other work.
        let cancel = cancel.child_token();
        // Dropping this future (caller gave up) aborts every in-flight call.
        let _abort_on_drop = cancel.clone().drop_guard();

        let semaphore = Arc::new(Semaphore::new(job.permits()));
        let workers: Vec<(usize, JoinHandle<BatchOutcome>)> = job
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().ok().map(|request| (index, request.clone())))
            .map(|(index, request)| {
                let semaphore = Arc::clone(&semaphore);
                let orchestrator = Arc::clone(&self.orchestrator);
                let cancel = cancel.clone();
                let worker = tokio::spawn(
                    async move {
                        let permit = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            permit = semaphore.acquire_owned() => permit.ok(),
                        };
                        let Some(_permit) = permit else {
                            return BatchOutcome::not_started();
                        };
                        if cancel.is_cancelled() {
                            return BatchOutcome::not_started();
                        }
                        let outcome = orchestrator.generate_with_cancel(&request, &cancel).await;
                        BatchOutcome::from_generation(outcome)
                    }
                    .in_current_span(),
                );
                (index, worker)
            })
            .collect();

        let timer = self.config.batch_timeout().map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(
                    timeout_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    "batch deadline reached; cancelling"
                );
                cancel.cancel();
            })
        });

        for (index, worker) in workers {
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(slot = index, error = %err, "batch worker terminated abnormally");
                    BatchOutcome::Failed {
                        kind: "worker_panicked".to_string(),
                        error: err.to_string(),
                        attempts: Vec::new(),
                    }
                }
            };
            job.record(index, outcome);
        }
        if let Some(timer) = timer {
            timer.abort();
        }

        let report = job.finish(started_at);
        info!(
            state = ?report.state,
            succeeded = report.succeeded_count,
            degraded = report.degraded_count,
            failed = report.failed_count,
            cancelled = report.cancelled_count,
            total_cost = %report.total_cost_usd,
            "batch finished"
        );
        report
    }
}
