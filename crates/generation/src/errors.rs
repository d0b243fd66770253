//! Error taxonomy and retry-policy types for the content generation domain.
//!
//! Errors are layered by the scope they affect:
//!
//! | Type | Scope | Recovery |
//! |------|-------|----------|
//! | [`RequestValidationError`] | a malformed request | none; surfaced immediately |
//! | [`ProviderError`] | one provider attempt | failover to the next candidate |
//! | [`RoutingError`] | candidate selection | none inside the router |
//! | [`GenerationError`] | one whole request | none; a batch fails only that slot |
//!
//! A quality-gate failure is absent: it is a result state
//! (`ContentResult::succeeded == false`), not an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GenerationAttempt, ProviderName};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by [`ProviderError::retry_policy`] so the router's health tracker
/// can tell a transient hiccup from a provider that will keep failing.
///
/// - `Retryable` errors: timeouts, transport failures, rate limits, 5xx.
/// - `NonRetryable` errors: rejected credentials, malformed requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. derived from a
        /// `Retry-After` header). `None` means no provider guidance.
        after: Option<Duration>,
    },
    /// Retrying against the same provider will not help.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

/// A [`crate::ContentRequest`] is malformed. Fatal and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RequestValidationError {
    /// The topic is empty or whitespace only.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// `max_length` must be a positive word count.
    #[error("max_length must be positive, got {value}")]
    NonPositiveMaxLength {
        /// The rejected value.
        value: i64,
    },

    /// A content type string did not name a known content type.
    #[error("unknown content type '{value}'")]
    UnknownContentType {
        /// The rejected string.
        value: String,
    },

    /// An optimisation strategy string did not name a known strategy.
    #[error("unknown optimization strategy '{value}'")]
    UnknownStrategy {
        /// The rejected string.
        value: String,
    },

    /// A provider override was supplied but is blank.
    #[error("provider override must not be blank")]
    EmptyProviderOverride,

    /// The payload could not be read as a request at all (missing field,
    /// wrong JSON type, out-of-range number).
    #[error("malformed request: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Provider attempts
// ---------------------------------------------------------------------------

/// Failure of a single provider call.
///
/// Recovered by the orchestrator through failover; only surfaced (wrapped in
/// [`GenerationError::GenerationExhausted`]) when every candidate has failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Network-level failure (connection refused, reset, DNS, TLS).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The attempt did not complete within the configured duration.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The provider throttled the request.
    #[error("rate limited by provider")]
    RateLimited {
        /// Provider-suggested wait, if it sent one.
        retry_after: Option<Duration>,
    },

    /// The provider rejected the credentials.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// The provider answered with an error status.
    #[error("provider returned status {status}: {message}")]
    Api {
        /// HTTP (or equivalent) status code.
        status: u16,
        /// Provider-supplied error text.
        message: String,
    },

    /// The provider answered successfully but the body could not be used.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The call was aborted by a cancellation signal.
    #[error("attempt cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Classifies this failure for the health tracker.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Api { status, .. } if *status >= 500 || *status == 408 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Api { .. } | Self::Authentication(_) => RetryPolicy::NonRetryable,
            Self::Transport(_) | Self::Timeout(_) | Self::MalformedResponse(_) | Self::Cancelled => {
                RetryPolicy::Retryable { after: None }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Candidate selection failed. Fatal for the request; the router never
/// retries internally.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RoutingError {
    /// Every provider was filtered out (circuit open, unhealthy, below the
    /// quality floor, or over budget).
    #[error("no provider available for strategy '{strategy}'")]
    NoProviderAvailable {
        /// Strategy that was being applied.
        strategy: String,
    },

    /// The request pinned a provider that is currently unavailable. Pinned
    /// requests never fall back to other providers.
    #[error("pinned provider '{provider}' is unavailable")]
    ProviderUnavailable {
        /// The pinned provider.
        provider: ProviderName,
    },

    /// The request pinned a provider that is not registered.
    #[error("provider '{provider}' is not registered")]
    UnknownProvider {
        /// The requested name.
        provider: String,
    },

    /// Two adapters were registered under the same name.
    #[error("provider '{provider}' registered more than once")]
    DuplicateProvider {
        /// The duplicated name.
        provider: ProviderName,
    },

    /// The router was built without any adapters.
    #[error("router has no registered providers")]
    EmptyRegistry,
}

// ---------------------------------------------------------------------------
// Request-level errors
// ---------------------------------------------------------------------------

/// Fatal outcome of one generation request.
///
/// Variants that occur after provider calls were made carry the attempt log
/// so callers can still account for the spend.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestValidationError),

    /// No prompt template is registered for the content type.
    #[error("no template registered for content type '{content_type}'")]
    UnknownContentType {
        /// The content type that could not be resolved.
        content_type: String,
    },

    /// The router produced no candidates (including an unavailable pinned
    /// override).
    #[error("no provider available: {0}")]
    NoProviderAvailable(#[from] RoutingError),

    /// Every candidate failed at transport/provider level.
    #[error("all {} provider attempt(s) failed", attempts.len())]
    GenerationExhausted {
        /// One failed attempt per candidate tried.
        attempts: Vec<GenerationAttempt>,
    },

    /// A cancellation signal interrupted the request.
    #[error("generation cancelled after {} attempt(s)", attempts.len())]
    Cancelled {
        /// Attempts recorded before the signal arrived.
        attempts: Vec<GenerationAttempt>,
    },
}

impl GenerationError {
    /// Attempts made before the failure; empty for pre-flight errors.
    pub fn attempts(&self) -> &[GenerationAttempt] {
        match self {
            Self::GenerationExhausted { attempts } | Self::Cancelled { attempts } => attempts,
            Self::InvalidRequest(_) | Self::UnknownContentType { .. } | Self::NoProviderAvailable(_) => {
                &[]
            }
        }
    }

    /// Short machine-readable classification, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "validation_error",
            Self::UnknownContentType { .. } => "unknown_content_type",
            Self::NoProviderAvailable(_) => "no_provider_available",
            Self::GenerationExhausted { .. } => "generation_exhausted",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Returns `true` for a cancellation, which batch reports keep distinct
    /// from failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retryable() {
        let err = ProviderError::Api {
            status: 400,
            message: "bad".into(),
        };
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(
            ProviderError::Authentication("nope".into()).retry_policy(),
            RetryPolicy::NonRetryable
        );
    }

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        let err = ProviderError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        assert_eq!(err.retry_policy(), RetryPolicy::Retryable { after: None });

        let wait = Some(Duration::from_secs(2));
        assert_eq!(
            ProviderError::RateLimited { retry_after: wait }.retry_policy(),
            RetryPolicy::Retryable { after: wait }
        );
    }

    #[test]
    fn pre_flight_errors_have_no_attempts() {
        let err = GenerationError::from(RequestValidationError::EmptyTopic);
        assert!(err.attempts().is_empty());
        assert_eq!(err.kind(), "validation_error");
    }
}
