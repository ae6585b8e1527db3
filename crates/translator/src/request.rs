use serde_json::Value;

/// Sampling and shape parameters copied verbatim between OpenAI and
/// OpenRouter request bodies. Both dialects share these field names.
const PASSTHROUGH_FIELDS: &[&str] = &[
    "temperature",
    "top_p",
    "frequency_penalty",
    "presence_penalty",
    "stop",
];

/// Translates an OpenAI-shaped chat-completions request into the
/// OpenRouter body. `model` is passed through verbatim (never remapped,
/// per the resolved open question in §9); `messages` is copied as-is,
/// preserving whatever shape `content` has (string or content-part array).
///
/// `default_max_tokens` is applied only when the client omitted
/// `max_tokens` AND the setting is greater than zero (P4). The `stream`
/// flag, if present, is copied exactly and never forced (P3).
pub fn translate_request(body: &Value, default_max_tokens: u32) -> Value {
    let mut out = serde_json::Map::new();

    if let Some(model) = body.get("model") {
        out.insert("model".to_string(), model.clone());
    }
    if let Some(messages) = body.get("messages") {
        out.insert("messages".to_string(), messages.clone());
    }
    if let Some(name) = body.get("name") {
        out.insert("name".to_string(), name.clone());
    }
    if let Some(stream) = body.get("stream") {
        out.insert("stream".to_string(), stream.clone());
    }

    for field in PASSTHROUGH_FIELDS {
        if let Some(value) = body.get(*field) {
            out.insert((*field).to_string(), value.clone());
        }
    }

    match body.get("max_tokens") {
        Some(value) => {
            out.insert("max_tokens".to_string(), value.clone());
        }
        None if default_max_tokens > 0 => {
            out.insert(
                "max_tokens".to_string(),
                Value::Number(default_max_tokens.into()),
            );
        }
        None => {}
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_and_messages_pass_through_verbatim() {
        let body = json!({
            "model": "openai/gpt-4o-mini",
            "messages": [{"role": "user", "content": "hi"}],
        });
        let out = translate_request(&body, 0);
        assert_eq!(out["model"], "openai/gpt-4o-mini");
        assert_eq!(out["messages"], body["messages"]);
    }

    #[test]
    fn default_max_tokens_applied_only_when_omitted_and_positive() {
        let body = json!({"model": "m", "messages": []});
        let out = translate_request(&body, 256);
        assert_eq!(out["max_tokens"], 256);

        let out = translate_request(&body, 0);
        assert!(out.get("max_tokens").is_none());

        let body_with_tokens = json!({"model": "m", "messages": [], "max_tokens": 10});
        let out = translate_request(&body_with_tokens, 256);
        assert_eq!(out["max_tokens"], 10);
    }

    #[test]
    fn stream_flag_is_never_forced() {
        let absent = json!({"model": "m", "messages": []});
        assert!(translate_request(&absent, 0).get("stream").is_none());

        let explicit_true = json!({"model": "m", "messages": [], "stream": true});
        assert_eq!(translate_request(&explicit_true, 0)["stream"], true);

        let explicit_false = json!({"model": "m", "messages": [], "stream": false});
        assert_eq!(translate_request(&explicit_false, 0)["stream"], false);
    }

    #[test]
    fn sampling_parameters_copy_through() {
        let body = json!({
            "model": "m",
            "messages": [],
            "temperature": 0.7,
            "top_p": 0.9,
            "frequency_penalty": 0.1,
            "presence_penalty": 0.2,
            "stop": ["\n"],
        });
        let out = translate_request(&body, 0);
        assert_eq!(out["temperature"], 0.7);
        assert_eq!(out["top_p"], 0.9);
        assert_eq!(out["frequency_penalty"], 0.1);
        assert_eq!(out["presence_penalty"], 0.2);
        assert_eq!(out["stop"], json!(["\n"]));
    }
}
