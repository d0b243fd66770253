//! OpenAI Chat Completions adapter.
//!
//! Also serves local OpenAI-compatible servers (vLLM, llama.cpp, LM Studio,
//! Ollama's `/v1` shim): point `base_url` at the server and leave the key
//! unset. Servers that omit `usage` are billed from a token estimate.

use std::time::Duration;

use async_trait::async_trait;
use generation::{
    GenerationProvider, ProviderDescriptor, ProviderError, ProviderPrompt, RawGeneration,
    TokenCount,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::http::HttpClient;
use crate::{Credential, ProviderSetupError};

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

fn parse_response(response: ChatResponse, prompt: &str) -> Result<RawGeneration, ProviderError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ProviderError::MalformedResponse("response contained no content".into()))?;

    let (tokens_in, tokens_out) = match response.usage {
        Some(usage) => (
            TokenCount::new(usage.prompt_tokens),
            TokenCount::new(usage.completion_tokens),
        ),
        None => (
            TokenCount::estimate_for_text(prompt),
            TokenCount::estimate_for_text(&text),
        ),
    };
    Ok(RawGeneration {
        text,
        tokens_in,
        tokens_out,
    })
}

/// Adapter for OpenAI-protocol chat models.
#[derive(Debug)]
pub struct OpenAiProvider {
    descriptor: ProviderDescriptor,
    http: HttpClient,
    endpoint: String,
    headers: HeaderMap,
    healthy: bool,
}

impl OpenAiProvider {
    /// Creates the adapter. Without a key no `Authorization` header is sent.
    pub fn new(
        descriptor: ProviderDescriptor,
        credential: Credential,
        base_url: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderSetupError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = credential.key() {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                ProviderSetupError::InvalidHeader {
                    provider: descriptor.name.clone(),
                    header: "authorization",
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        let endpoint = if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        };
        Ok(Self {
            endpoint,
            http: HttpClient::new(request_timeout)?,
            healthy: credential.is_usable(),
            headers,
            descriptor,
        })
    }

    /// Full URL of the chat completions endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    #[instrument(
        name = "openai.generate",
        skip_all,
        fields(provider = %self.descriptor.name, model = %self.descriptor.model)
    )]
    async fn generate(
        &self,
        prompt: &ProviderPrompt,
        cancel: &CancellationToken,
    ) -> Result<RawGeneration, ProviderError> {
        let request = ChatRequest {
            model: self.descriptor.model.as_str(),
            messages: [ChatMessage {
                role: "user",
                content: &prompt.text,
            }],
            max_tokens: prompt.max_output_tokens.as_u64().max(1),
        };
        let response: ChatResponse = self
            .http
            .post_json(&self.endpoint, &self.headers, &request, cancel)
            .await?;
        let raw = parse_response(response, &prompt.text)?;
        debug!(
            tokens_in = raw.tokens_in.as_u64(),
            tokens_out = raw.tokens_out.as_u64(),
            "chat completion received"
        );
        Ok(raw)
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}
