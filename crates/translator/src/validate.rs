use orp_core::error::ProxyError;
use serde_json::Value;

/// Validates a translated chat-completions request body per §4.F. Failures
/// yield a 400 (`invalid_request_error`) at the boundary.
pub fn validate_request(body: &Value) -> Result<(), ProxyError> {
    let model = body
        .get("model")
        .and_then(|m| m.as_str())
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ProxyError::InvalidRequest("model must be a non-blank string".into()))?;
    let _ = model;

    let messages = body
        .get("messages")
        .and_then(|m| m.as_array())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ProxyError::InvalidRequest("messages must be a non-empty array".into()))?;

    for message in messages {
        let role = message
            .get("role")
            .and_then(|r| r.as_str())
            .filter(|r| !r.trim().is_empty());
        if role.is_none() {
            return Err(ProxyError::InvalidRequest(
                "every message must have a non-blank role".into(),
            ));
        }

        let content_ok = match message.get("content") {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(parts)) => !parts.is_empty(),
            _ => false,
        };
        if !content_ok {
            return Err(ProxyError::InvalidRequest(
                "every message must have non-blank content".into(),
            ));
        }
    }

    if let Some(temperature) = body.get("temperature").and_then(|t| t.as_f64())
        && !(0.0..=2.0).contains(&temperature)
    {
        return Err(ProxyError::InvalidRequest(
            "temperature must be in [0, 2]".into(),
        ));
    }

    if let Some(max_tokens) = body.get("max_tokens").and_then(|t| t.as_i64())
        && max_tokens <= 0
    {
        return Err(ProxyError::InvalidRequest(
            "max_tokens must be > 0".into(),
        ));
    }

    if let Some(top_p) = body.get("top_p").and_then(|t| t.as_f64())
        && !(0.0..=1.0).contains(&top_p)
    {
        return Err(ProxyError::InvalidRequest("top_p must be in [0, 1]".into()));
    }

    Ok(())
}
