use serde_json::{Value, json};

/// Translates a non-streaming OpenRouter chat-completions response back to
/// OpenAI shape: `id`, `choices[*].{index, message, finish_reason}`,
/// `usage.{prompt_tokens, completion_tokens, total_tokens}`. `model` is set
/// to whatever the upstream reported (never re-mapped).
pub fn translate_response(upstream: &Value) -> Value {
    let id = upstream.get("id").cloned().unwrap_or(Value::Null);
    let model = upstream.get("model").cloned().unwrap_or(Value::Null);
    let created = upstream
        .get("created")
        .cloned()
        .unwrap_or_else(|| json!(chrono::Utc::now().timestamp()));

    let choices = upstream
        .get("choices")
        .and_then(|c| c.as_array())
        .map(|choices| {
            choices
                .iter()
                .map(|choice| {
                    json!({
                        "index": choice.get("index").cloned().unwrap_or(json!(0)),
                        "message": choice.get("message").cloned().unwrap_or(Value::Null),
                        "finish_reason": choice.get("finish_reason").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let usage = upstream.get("usage").map(|u| {
        json!({
            "prompt_tokens": u.get("prompt_tokens").cloned().unwrap_or(json!(0)),
            "completion_tokens": u.get("completion_tokens").cloned().unwrap_or(json!(0)),
            "total_tokens": u.get("total_tokens").cloned().unwrap_or(json!(0)),
        })
    });

    let mut out = json!({
        "id": id,
        "object": "chat.completion",
        "created": created,
        "model": model,
        "choices": choices,
    });
    if let Some(usage) = usage {
        out["usage"] = usage;
    }
    out
}
