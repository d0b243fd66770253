//! Offline deterministic provider.
//!
//! Produces text from the prompt alone: the prompt's first line followed by
//! filler sentences up to roughly half the requested completion budget. The
//! same prompt always yields the same text and token counts, so demos and
//! tests can run without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use generation::{
    GenerationProvider, ProviderDescriptor, ProviderError, ProviderPrompt, RawGeneration,
    TokenCount,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const FILLER: &[&str] = &[
    "It covers the essentials clearly.",
    "Each point stays concrete and practical.",
    "Examples keep the ideas grounded.",
    "The closing thought ties everything together.",
];

/// Deterministic in-process provider.
#[derive(Debug)]
pub struct MockProvider {
    descriptor: ProviderDescriptor,
    latency: Duration,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Creates a mock that answers immediately.
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self {
            descriptor,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Simulates network latency; cancellation is honoured while waiting.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn compose(prompt: &ProviderPrompt) -> String {
        // Completion tokens → words is roughly 3/4; aim for half the budget.
        let target_words = usize::try_from(prompt.max_output_tokens.as_u64() * 3 / 8)
            .unwrap_or(usize::MAX)
            .max(1);
        let mut text = prompt.text.lines().next().unwrap_or_default().trim().to_string();
        let mut words = text.split_whitespace().count();
        for sentence in FILLER.iter().cycle() {
            if words >= target_words {
                break;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(sentence);
            words += sentence.split_whitespace().count();
        }
        text
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn generate(
        &self,
        prompt: &ProviderPrompt,
        cancel: &CancellationToken,
    ) -> Result<RawGeneration, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }
        let text = Self::compose(prompt);
        let raw = RawGeneration {
            tokens_in: TokenCount::estimate_for_text(&prompt.text),
            tokens_out: TokenCount::estimate_for_text(&text),
            text,
        };
        debug!(
            provider = %self.descriptor.name,
            tokens_out = raw.tokens_out.as_u64(),
            "mock response"
        );
        Ok(raw)
    }
}
