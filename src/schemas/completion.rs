use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-call performance sample. `total_tokens` is derived as
/// `prompt_tokens + completion_tokens` when the gateway does not report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub latency_ms: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Canonical result of one completion call, regardless of which provider
/// shape the gateway returned. The unmodified gateway payload is kept on
/// `raw` for downstream inspection.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub content: String,
    pub metrics: Metrics,
    pub model: String,
    pub raw: Value,
}
