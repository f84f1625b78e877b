use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tokio_retry2::strategy::ExponentialFactorBackoff;
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

use crate::errors::TransportError;

/// Total attempts per call, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

const BACKOFF_BASE_MS: u64 = 2_000;
const BACKOFF_FACTOR: f64 = 2.0;
const BACKOFF_CAP_SECS: u64 = 10;

/// Decoded gateway reply from one successful attempt. `elapsed` is the wall
/// clock of that attempt only, not of the whole retry sequence.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: Value,
    pub elapsed: Duration,
}

/// One attempt against the gateway, no retry. The production implementation
/// is [`HttpTransport`]; tests substitute scripted implementations.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn send_once(&self, payload: &Value) -> Result<RawResponse, TransportError>;
}

/// Delay before each retry: 2s, 4s, 8s, ... capped at 10s. No jitter.
pub fn backoff_schedule() -> impl Iterator<Item = Duration> {
    ExponentialFactorBackoff::from_millis(BACKOFF_BASE_MS, BACKOFF_FACTOR)
        .max_delay(Duration::from_secs(BACKOFF_CAP_SECS))
}

/// Runs `send_once` under the retry policy: up to [`MAX_ATTEMPTS`] attempts,
/// retrying on network and HTTP-status failures with exponential backoff
/// (a 429 `Retry-After` hint overrides the backoff step for that retry).
/// After the last failed attempt the last error propagates unmodified.
pub async fn send_with_retry(
    transport: &dyn GatewayTransport,
    payload: &Value,
) -> Result<RawResponse, TransportError> {
    let strategy = backoff_schedule().take(MAX_ATTEMPTS as usize - 1);
    let attempt = AtomicU32::new(0);

    Retry::spawn(strategy, || async {
        let current_attempt = attempt.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "gateway request attempt {}/{}",
            current_attempt + 1,
            MAX_ATTEMPTS
        );

        match transport.send_once(payload).await {
            Ok(raw) => Ok(raw),
            Err(err) => {
                warn!(
                    "gateway request failed on attempt {}/{}: {}",
                    current_attempt + 1,
                    MAX_ATTEMPTS,
                    err
                );
                let rate_limit_hint = match &err {
                    TransportError::Status {
                        status: 429,
                        retry_after,
                        ..
                    } => *retry_after,
                    _ => None,
                };
                if let Some(delay) = rate_limit_hint {
                    Err(RetryError::retry_after(err, delay))
                } else if err.is_transient() {
                    Err(RetryError::transient(err))
                } else {
                    Err(RetryError::permanent(err))
                }
            }
        }
    })
    .await
}

/// HTTP transport for the Concentrate gateway: bearer-authenticated JSON
/// POSTs with a per-attempt timeout.
pub struct HttpTransport {
    inner: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            inner: reqwest::Client::new(),
            url: format!("{}/responses/", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn send_once(&self, payload: &Value) -> Result<RawResponse, TransportError> {
        let started = Instant::now();

        let response = self
            .inner
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection"
                } else {
                    "other"
                };
                TransportError::Network {
                    kind,
                    detail: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs);

            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response body".to_string());
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| body["error"]["message"].as_str().map(String::from))
                .unwrap_or(text);

            return Err(TransportError::Status {
                status: status.as_u16(),
                detail,
                retry_after,
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        Ok(RawResponse {
            body,
            elapsed: started.elapsed(),
        })
    }
}
