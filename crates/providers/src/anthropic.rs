//! Anthropic Messages API adapter.
//!
//! `POST {base_url}/v1/messages` with the prompt as a single user message.
//! Text blocks of the response are concatenated; `usage` supplies the billed
//! token counts.

use std::time::Duration;

use async_trait::async_trait;
use generation::{
    GenerationProvider, ProviderDescriptor, ProviderError, ProviderPrompt, RawGeneration,
    TokenCount,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::http::HttpClient;
use crate::{Credential, ProviderSetupError};

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Required `anthropic-version` header value.
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u64,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

fn parse_response(response: MessagesResponse) -> Result<RawGeneration, ProviderError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse(
            "response contained no text blocks".into(),
        ));
    }
    Ok(RawGeneration {
        text,
        tokens_in: TokenCount::new(response.usage.input_tokens),
        tokens_out: TokenCount::new(response.usage.output_tokens),
    })
}

/// Adapter for Claude models.
#[derive(Debug)]
pub struct AnthropicProvider {
    descriptor: ProviderDescriptor,
    http: HttpClient,
    endpoint: String,
    headers: HeaderMap,
    healthy: bool,
}

impl AnthropicProvider {
    /// Creates the adapter. A missing key yields an unhealthy adapter rather
    /// than an error.
    pub fn new(
        descriptor: ProviderDescriptor,
        credential: Credential,
        base_url: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderSetupError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        if let Some(key) = credential.key() {
            let value = HeaderValue::from_str(key).map_err(|_| ProviderSetupError::InvalidHeader {
                provider: descriptor.name.clone(),
                header: "x-api-key",
            })?;
            headers.insert("x-api-key", value);
        }

        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Ok(Self {
            endpoint: format!("{base}/v1/messages"),
            http: HttpClient::new(request_timeout)?,
            healthy: credential.key().is_some(),
            headers,
            descriptor,
        })
    }

    /// Full URL of the messages endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    #[instrument(
        name = "anthropic.generate",
        skip_all,
        fields(provider = %self.descriptor.name, model = %self.descriptor.model)
    )]
    async fn generate(
        &self,
        prompt: &ProviderPrompt,
        cancel: &CancellationToken,
    ) -> Result<RawGeneration, ProviderError> {
        let request = MessagesRequest {
            model: self.descriptor.model.as_str(),
            max_tokens: prompt.max_output_tokens.as_u64().max(1),
            messages: [Message {
                role: "user",
                content: &prompt.text,
            }],
        };
        let response: MessagesResponse = self
            .http
            .post_json(&self.endpoint, &self.headers, &request, cancel)
            .await?;
        let raw = parse_response(response)?;
        debug!(
            tokens_in = raw.tokens_in.as_u64(),
            tokens_out = raw.tokens_out.as_u64(),
            "anthropic response received"
        );
        Ok(raw)
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}
