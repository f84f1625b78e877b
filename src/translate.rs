use serde_json::{json, Value};

use crate::schemas::{ChatMessage, CompletionRequest, Role};

/// Strips the provider namespace from a model identifier: the gateway
/// expects `gpt-4o-mini`, not `openai/gpt-4o-mini`.
pub fn bare_model(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

/// Flattens a role-tagged conversation into the gateway's single text block.
///
/// `system` turns are prefixed `System: `, `assistant` turns `Assistant: `,
/// user turns are emitted verbatim. Empty-content messages are skipped, so
/// an all-empty conversation flattens to the empty string.
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    let mut parts = Vec::with_capacity(messages.len());
    for message in messages {
        if message.content.is_empty() {
            continue;
        }
        match message.role {
            Role::System => parts.push(format!("System: {}", message.content)),
            Role::Assistant => parts.push(format!("Assistant: {}", message.content)),
            Role::User => parts.push(message.content.clone()),
        }
    }
    parts.join("\n")
}

/// Builds the outbound gateway payload. `model`, `input` and `temperature`
/// are always present; `max_output_tokens`, `top_p` and `stream` are omitted
/// entirely (not null) when unset.
pub fn build_payload(request: &CompletionRequest) -> Value {
    let mut fields = serde_json::Map::new();
    fields.insert("model".to_string(), json!(bare_model(&request.model)));
    fields.insert("input".to_string(), json!(flatten_messages(&request.messages)));
    fields.insert("temperature".to_string(), json!(request.temperature));

    if let Some(max_tokens) = request.max_tokens {
        fields.insert("max_output_tokens".to_string(), json!(max_tokens));
    }
    if let Some(top_p) = request.top_p {
        fields.insert("top_p".to_string(), json!(top_p));
    }
    if request.stream {
        fields.insert("stream".to_string(), json!(true));
    }

    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_model_strips_namespace() {
        assert_eq!(bare_model("openai/gpt-4o-mini"), "gpt-4o-mini");
        assert_eq!(bare_model("gpt-4o-mini"), "gpt-4o-mini");
        assert_eq!(bare_model("a/b/claude-haiku-3"), "claude-haiku-3");
    }

    #[test]
    fn flatten_prefixes_roles_and_preserves_order() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
            ChatMessage::user("bye"),
        ];
        assert_eq!(
            flatten_messages(&messages),
            "System: be brief\nhello\nAssistant: hi\nbye"
        );
    }

    #[test]
    fn flatten_skips_empty_content() {
        let messages = vec![
            ChatMessage::system(""),
            ChatMessage::user("hello"),
            ChatMessage::assistant(""),
        ];
        assert_eq!(flatten_messages(&messages), "hello");
    }

    #[test]
    fn flatten_all_empty_yields_empty_string() {
        let messages = vec![ChatMessage::user(""), ChatMessage::system("")];
        assert_eq!(flatten_messages(&messages), "");
        assert_eq!(flatten_messages(&[]), "");
    }

    #[test]
    fn user_role_has_no_prefix() {
        let messages = vec![ChatMessage::user("plain text")];
        assert_eq!(flatten_messages(&messages), "plain text");
    }

    #[test]
    fn payload_always_carries_required_fields() {
        let request = CompletionRequest::new("openai/gpt-4o-mini", vec![ChatMessage::user("q")]);
        let payload = build_payload(&request);
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["input"], "q");
        assert_eq!(payload["temperature"], 0.7);
        assert!(payload.get("max_output_tokens").is_none());
        assert!(payload.get("top_p").is_none());
        assert!(payload.get("stream").is_none());
    }

    #[test]
    fn payload_includes_optionals_when_set() {
        let mut request = CompletionRequest::new("m", vec![ChatMessage::user("q")])
            .max_tokens(256)
            .top_p(0.9);
        request.stream = true;
        let payload = build_payload(&request);
        assert_eq!(payload["max_output_tokens"], 256);
        assert_eq!(payload["top_p"], 0.9);
        assert_eq!(payload["stream"], true);
    }
}
