//! ContentGen orchestration layer.
//!
//! This crate sequences calls between the domain types in [`generation`] and
//! the provider adapters behind [`generation::GenerationProvider`]:
//!
//! - [`router`]: provider registry, strategy-based ranking, failover chain.
//! - [`health`]: per-provider circuit breaker backing the router.
//! - [`templates`]: prompt templates and the corrective retry prompt.
//! - [`validator`]: the reference rule-based [`generation::QualityValidator`].
//! - [`orchestrator`]: the single-request pipeline.
//! - [`batch`]: bounded-concurrency fan-out over many requests.
//!
//! ## Architectural Layer
//!
//! **Orchestration.** No HTTP or wire formats live here; adapters are injected
//! as trait objects, and one explicitly constructed [`ProviderRouter`] is
//! shared by the orchestrator and the batch engine.

pub mod batch;
pub mod health;
pub mod orchestrator;
pub mod router;
pub mod templates;
pub mod validator;

pub use batch::{BatchConfig, BatchEngine, BatchJob};
pub use health::{CircuitBreakerConfig, HealthTracker};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use router::{Candidate, ProviderRouter, RouterConfig};
pub use templates::{corrective_prompt, PromptTemplate, TemplateCatalog};
pub use validator::{RuleBasedValidator, ValidatorConfig};
