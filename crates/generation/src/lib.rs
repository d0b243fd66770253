//! Core domain for ContentGen.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and error type used by the generation subsystem, plus the two port
//! traits the orchestration layer depends on. Infrastructure crates implement
//! the ports; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network I/O.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RequestId`, `BatchId`, `ProviderName`, `ModelName`) |
//! | [`types`] | Value types (`TokenCount`, `TokenCost`, `CostPerToken`, `QualityScore`, etc.) |
//! | [`request`] | `ContentRequest`, `ContentType`, `OptimizationStrategy` |
//! | [`provider`] | The `GenerationProvider` port and its payload types |
//! | [`validation`] | The `QualityValidator` port and `ValidationOutcome` |
//! | [`result`] | `GenerationAttempt` and `ContentResult` |
//! | [`batch`] | `MaxConcurrency`, `BatchState`, `BatchOutcome`, `BatchReport` |
//! | [`errors`] | Error taxonomy and `RetryPolicy` |

pub mod batch;
pub mod errors;
pub mod identifiers;
pub mod provider;
pub mod request;
pub mod result;
pub mod types;
pub mod validation;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use batch::{BatchOutcome, BatchReport, BatchState, MaxConcurrency};
pub use errors::{GenerationError, ProviderError, RequestValidationError, RetryPolicy, RoutingError};
pub use identifiers::{BatchId, ModelName, ProviderName, RequestId};
pub use provider::{
    GenerationProvider, ProviderDescriptor, ProviderPrompt, ProviderStatus, RawGeneration,
};
pub use request::{
    ContentRequest, ContentType, OptimizationStrategy, RequestPayload, DEFAULT_AUDIENCE,
};
pub use result::{AttemptPhase, ContentResult, GenerationAttempt};
pub use types::{
    CostBudget, CostPerToken, QualityRating, QualityScore, Timestamp, TokenCost, TokenCount,
};
pub use validation::{QualityValidator, ValidationOutcome};
