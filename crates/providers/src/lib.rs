//! ContentGen provider adapters.
//!
//! Implements the [`generation::GenerationProvider`] port for:
//!
//! - [`anthropic::AnthropicProvider`]: Anthropic Messages API.
//! - [`openai::OpenAiProvider`]: OpenAI Chat Completions API, and any local
//!   server speaking the same protocol.
//! - [`mock::MockProvider`]: offline and deterministic, for demos and tests.
//!
//! [`build_provider`] turns one [`ProviderSettings`] entry from configuration
//! into a shareable adapter.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, and response
//! parsing live here. The orchestration layer sees only
//! [`generation::GenerationProvider`].

pub mod anthropic;
mod factory;
mod http;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use factory::{build_provider, Credential, ProviderKind, ProviderSettings, ProviderSetupError};
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
