//! JSON-over-HTTP plumbing shared by the remote adapters.

use std::time::Duration;

use generation::ProviderError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ProviderSetupError;

/// Longest provider error text carried into a [`ProviderError`].
const MAX_ERROR_TEXT: usize = 512;
/// Upper bound on a honoured `Retry-After` hint.
const MAX_RETRY_AFTER_SECS: u64 = 60 * 60;

/// Thin wrapper over a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub(crate) fn new(timeout: Duration) -> Result<Self, ProviderSetupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// POSTs `body` as JSON and decodes a JSON response.
    ///
    /// Returns [`ProviderError::Cancelled`] as soon as `cancel` fires; the
    /// in-flight request is dropped, which closes its connection.
    pub(crate) async fn post_json<B, R>(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let exchange = async {
            let response = self
                .client
                .post(url)
                .headers(headers.clone())
                .json(body)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.map_err(|e| self.transport_error(e))?;
            if !status.is_success() {
                return Err(status_error(status, retry_after, &text));
            }
            serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = exchange => result,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}

/// Maps a non-success status to the provider error taxonomy.
///
/// Both supported APIs wrap errors as `{"error": {"message": ...}}`; any
/// other body is carried verbatim (truncated).
fn status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(MAX_ERROR_TEXT).collect());
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(message),
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
