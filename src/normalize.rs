use std::time::Duration;

use serde_json::Value;

use crate::schemas::{CompletionResult, Metrics};

/// Field-name candidates tried per logical field, in priority order. The
/// gateway does not guarantee a uniform response shape across providers, so
/// the tolerance is stated as data rather than scattered branching.
const OUTPUT_FIELDS: &[&str] = &["output", "text", "content"];
const PROMPT_TOKEN_FIELDS: &[&str] = &["prompt_tokens", "input_tokens"];
const COMPLETION_TOKEN_FIELDS: &[&str] = &["completion_tokens", "output_tokens"];

fn first_str<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a str> {
    candidates.iter().find_map(|field| value[*field].as_str())
}

fn first_u64(value: &Value, candidates: &[&str]) -> Option<u64> {
    candidates.iter().find_map(|field| value[*field].as_u64())
}

/// Rounded to 2 decimal places, as recorded in the output document.
fn latency_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// Maps a raw gateway body into the canonical result envelope.
///
/// Output text falls back through [`OUTPUT_FIELDS`] and defaults to empty;
/// token counts accept both the `prompt/completion` and `input/output`
/// naming conventions, and a missing `total_tokens` is derived as the sum of
/// the two counts (missing counts default to 0). The unmodified body rides
/// along on `raw`.
pub fn normalize(body: Value, model: &str, elapsed: Duration) -> CompletionResult {
    let content = first_str(&body, OUTPUT_FIELDS).unwrap_or_default().to_string();

    let usage = &body["usage"];
    let prompt_tokens = first_u64(usage, PROMPT_TOKEN_FIELDS).unwrap_or(0);
    let completion_tokens = first_u64(usage, COMPLETION_TOKEN_FIELDS).unwrap_or(0);
    let total_tokens = usage["total_tokens"]
        .as_u64()
        .unwrap_or(prompt_tokens + completion_tokens);

    CompletionResult {
        content,
        metrics: Metrics {
            latency_ms: latency_ms(elapsed),
            prompt_tokens,
            completion_tokens,
            total_tokens,
        },
        model: model.to_string(),
        raw: body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_usage_yields_zero_tokens() {
        let result = normalize(json!({"output": "hi"}), "m", Duration::from_millis(10));
        assert_eq!(result.metrics.prompt_tokens, 0);
        assert_eq!(result.metrics.completion_tokens, 0);
        assert_eq!(result.metrics.total_tokens, 0);
    }

    #[test]
    fn alternate_usage_naming_is_accepted() {
        let body = json!({
            "output": "hi",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let result = normalize(body, "m", Duration::from_millis(10));
        assert_eq!(result.metrics.prompt_tokens, 10);
        assert_eq!(result.metrics.completion_tokens, 5);
        assert_eq!(result.metrics.total_tokens, 15);
    }

    #[test]
    fn explicit_total_tokens_wins_over_derivation() {
        let body = json!({
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 99}
        });
        let result = normalize(body, "m", Duration::from_millis(10));
        assert_eq!(result.metrics.total_tokens, 99);
    }

    #[test]
    fn output_field_candidates_tried_in_order() {
        let both = json!({"output": "a", "text": "b"});
        assert_eq!(normalize(both, "m", Duration::ZERO).content, "a");

        let text_only = json!({"text": "b", "content": "c"});
        assert_eq!(normalize(text_only, "m", Duration::ZERO).content, "b");

        let content_only = json!({"content": "c"});
        assert_eq!(normalize(content_only, "m", Duration::ZERO).content, "c");

        let none = json!({"something_else": 1});
        assert_eq!(normalize(none, "m", Duration::ZERO).content, "");
    }

    #[test]
    fn latency_rounds_to_two_decimals() {
        let result = normalize(json!({}), "m", Duration::from_micros(123_456));
        assert_eq!(result.metrics.latency_ms, 123.46);
    }

    #[test]
    fn raw_body_is_carried_through() {
        let body = json!({"output": "hi", "provider_extra": {"k": "v"}});
        let result = normalize(body.clone(), "openai/gpt-4o-mini", Duration::ZERO);
        assert_eq!(result.raw, body);
        assert_eq!(result.model, "openai/gpt-4o-mini");
    }
}
