use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use orp_core::error::ProxyError;
use orp_upstream::ApiResult;
use serde_json::Value;

use crate::AppState;

/// The core chat-completions pipeline (§4.H): parse, validate, translate,
/// dispatch — non-streaming path returns a single translated JSON response;
/// the streaming path hands off to the relay without touching the bytes.
pub async fn chat_completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<axum::response::Response, ProxyError> {
    let api_key = state.settings.api_key_plaintext();
    if api_key.is_empty() {
        return Err(ProxyError::Unauthorized(
            "no managed API key is configured".into(),
        ));
    }

    let request: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::InvalidRequest(format!("malformed JSON body: {e}")))?;

    orp_translator::validate_request(&request)?;
    orp_translator::validate_multimodal(&request, &state.catalog).await?;

    let default_max_tokens = state.settings.snapshot().default_max_tokens;
    let translated = orp_translator::translate_request(&request, default_max_tokens);

    let stream = translated
        .get("stream")
        .and_then(|s| s.as_bool())
        .unwrap_or(false);

    if stream {
        return crate::streaming::stream_chat_completions(state, api_key, translated).await;
    }

    match state.upstream.chat_completions(&api_key, &translated).await {
        ApiResult::Success { data, .. } => {
            Ok(Json(orp_translator::translate_response(&data)).into_response())
        }
        ApiResult::Error {
            status_code: Some(status),
            cause,
            message,
            ..
        } => Err(upstream_error(status, cause.unwrap_or(message))),
        ApiResult::Error {
            status_code: None,
            message,
            ..
        } => Err(ProxyError::NetworkError(message)),
    }
}

fn upstream_error(status: u16, body: String) -> ProxyError {
    match status {
        401 => ProxyError::Unauthorized(body),
        429 => ProxyError::RateLimited { body: Some(body) },
        _ => ProxyError::UpstreamError { status, body },
    }
}
