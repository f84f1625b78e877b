use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::errors::ClientError;
use crate::normalize;
use crate::schemas::{ChatMessage, CompletionRequest, CompletionResult};
use crate::settings::Settings;
use crate::translate;
use crate::transport::{send_with_retry, GatewayTransport, HttpTransport};

/// Client for the Concentrate gateway. Constructed once per run; credential,
/// endpoint and timeout are fixed after construction, so clones may be used
/// concurrently without locking.
#[derive(Clone)]
pub struct ConcentrateClient {
    transport: Arc<dyn GatewayTransport>,
    probe_model: String,
}

impl std::fmt::Debug for ConcentrateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcentrateClient")
            .field("probe_model", &self.probe_model)
            .finish_non_exhaustive()
    }
}

impl ConcentrateClient {
    /// Fails fast with [`ClientError::Config`] on a blank credential, before
    /// any network activity.
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        if settings.api_key.trim().is_empty() {
            return Err(ClientError::Config(
                "API key is required. Set CONCENTRATE_API_KEY.".to_string(),
            ));
        }

        let transport = HttpTransport::new(
            &settings.base_url,
            settings.api_key.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        );

        info!("initialized Concentrate client with base URL: {}", settings.base_url);

        Ok(Self {
            transport: Arc::new(transport),
            probe_model: settings.probe_model().to_string(),
        })
    }

    /// Builds a client over an already-constructed transport. This is the
    /// seam the tests use to substitute scripted gateways.
    pub fn with_transport(
        transport: Arc<dyn GatewayTransport>,
        probe_model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            probe_model: probe_model.into(),
        }
    }

    /// Issues one completion call: translate, send with retry, normalize.
    ///
    /// Every transport, HTTP, or decoding failure surfaces as
    /// [`ClientError::RequestFailed`]; callers never see raw transport errors.
    pub async fn execute(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, ClientError> {
        let payload = translate::build_payload(request);
        debug!("making gateway request with model: {}", request.model);

        let raw = send_with_retry(self.transport.as_ref(), &payload)
            .await
            .map_err(|e| {
                error!("API request failed: {}", e);
                ClientError::RequestFailed(e.to_string())
            })?;

        let result = normalize::normalize(raw.body, &request.model, raw.elapsed);
        info!(
            "request completed in {}ms, {} tokens",
            result.metrics.latency_ms, result.metrics.total_tokens
        );
        Ok(result)
    }

    /// Connectivity probe: one minimal greeting request against the probe
    /// model. True iff a non-empty assistant response came back; every
    /// failure is caught and reported as `false`.
    pub async fn probe(&self) -> bool {
        let request = CompletionRequest::new(
            self.probe_model.clone(),
            vec![ChatMessage::user("Say hello")],
        )
        .max_tokens(10);

        match self.execute(&request).await {
            Ok(result) => !result.content.is_empty(),
            Err(e) => {
                error!("connection test failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::errors::TransportError;
    use crate::transport::RawResponse;

    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        payloads: Mutex<Vec<Value>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                payloads: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn send_once(&self, payload: &Value) -> Result<RawResponse, TransportError> {
            self.payloads.lock().unwrap().push(payload.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted transport exhausted")
        }
    }

    fn ok_response(output: &str) -> RawResponse {
        RawResponse {
            body: json!({"output": output, "usage": {"prompt_tokens": 2, "completion_tokens": 3}}),
            elapsed: Duration::from_millis(40),
        }
    }

    fn settings_with_key(api_key: &str) -> Settings {
        Settings {
            api_key: api_key.into(),
            base_url: "https://api.concentrate.ai/v1".into(),
            openai_models: vec!["openai/gpt-4o-mini".into()],
            anthropic_models: vec!["anthropic/claude-haiku-3".into()],
            fallback_model: "openai/gpt-4o-mini".into(),
            request_timeout_secs: 30,
            pacing_ms: 500,
            output_dir: PathBuf::from("outputs"),
        }
    }

    #[test]
    fn blank_credential_fails_construction() {
        for key in ["", "   "] {
            let err = ConcentrateClient::new(&settings_with_key(key)).unwrap_err();
            assert!(matches!(err, ClientError::Config(_)));
        }
    }

    #[test]
    fn valid_credential_constructs() {
        assert!(ConcentrateClient::new(&settings_with_key("test-key")).is_ok());
    }

    #[tokio::test]
    async fn execute_normalizes_and_sends_translated_payload() {
        let transport = ScriptedTransport::new(vec![Ok(ok_response("hello"))]);
        let client = ConcentrateClient::with_transport(transport.clone(), "openai/gpt-4o-mini");

        let request = CompletionRequest::new(
            "openai/gpt-4o-mini",
            vec![ChatMessage::user("Say hello")],
        )
        .max_tokens(10);
        let result = client.execute(&request).await.unwrap();

        assert_eq!(result.content, "hello");
        assert_eq!(result.metrics.total_tokens, 5);
        assert_eq!(result.model, "openai/gpt-4o-mini");

        let payloads = transport.payloads.lock().unwrap();
        assert_eq!(payloads[0]["model"], "gpt-4o-mini");
        assert_eq!(payloads[0]["input"], "Say hello");
        assert_eq!(payloads[0]["max_output_tokens"], 10);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_retries_through_transient_failures() {
        let fail = || {
            Err(TransportError::Status {
                status: 500,
                detail: "flaky".into(),
                retry_after: None,
            })
        };
        let transport = ScriptedTransport::new(vec![fail(), fail(), Ok(ok_response("ok"))]);
        let client = ConcentrateClient::with_transport(transport, "m");

        let request = CompletionRequest::new("m", vec![ChatMessage::user("q")]);
        let result = client.execute(&request).await.unwrap();
        assert_eq!(result.content, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn execute_exhaustion_becomes_request_failed() {
        let fail = |detail: &str| {
            Err(TransportError::Status {
                status: 500,
                detail: detail.into(),
                retry_after: None,
            })
        };
        let transport =
            ScriptedTransport::new(vec![fail("one"), fail("two"), fail("last detail")]);
        let client = ConcentrateClient::with_transport(transport, "m");

        let request = CompletionRequest::new("m", vec![ChatMessage::user("q")]);
        let err = client.execute(&request).await.unwrap_err();
        match err {
            ClientError::RequestFailed(detail) => {
                assert_eq!(detail, "HTTP 500: last detail");
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_true_on_non_empty_response() {
        let transport = ScriptedTransport::new(vec![Ok(ok_response("hello there"))]);
        let client = ConcentrateClient::with_transport(transport.clone(), "openai/gpt-4o-mini");
        assert!(client.probe().await);

        let payloads = transport.payloads.lock().unwrap();
        assert_eq!(payloads[0]["max_output_tokens"], 10);
        assert_eq!(payloads[0]["model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn probe_false_on_empty_response() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse {
            body: json!({"output": ""}),
            elapsed: Duration::from_millis(5),
        })]);
        let client = ConcentrateClient::with_transport(transport, "m");
        assert!(!client.probe().await);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_swallows_errors() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Decode("bad".into()))]);
        let client = ConcentrateClient::with_transport(transport, "m");
        assert!(!client.probe().await);
    }
}
