use orp_catalog::ModelCatalog;
use orp_core::error::ProxyError;
use serde_json::Value;

/// Maps a content-part `type` to the modality name used in
/// `architecture.inputModalities`.
fn modality_for_part_type(part_type: &str) -> Option<&'static str> {
    match part_type {
        "image_url" => Some("image"),
        "input_audio" => Some("audio"),
        "video_url" => Some("video"),
        "file" => Some("file"),
        _ => None,
    }
}

/// Inspects message `content` arrays for non-text parts and checks them
/// against the target model's cached capabilities. If the model is not
/// cached, validation is skipped (fail-open, logged at debug) — see
/// `ModelCatalog::by_id`.
pub async fn validate_multimodal(body: &Value, catalog: &ModelCatalog) -> Result<(), ProxyError> {
    let Some(model_id) = body.get("model").and_then(|m| m.as_str()) else {
        return Ok(());
    };

    let detected = detect_content_types(body);
    if detected.is_empty() {
        return Ok(());
    }

    let Some(model) = catalog.by_id(model_id).await else {
        tracing::debug!(model = model_id, "model not cached, skipping multimodal validation");
        return Ok(());
    };

    for content_type in detected {
        let Some(modality) = modality_for_part_type(&content_type) else {
            continue;
        };
        if !model.architecture.input_modalities.iter().any(|m| m == modality) {
            return Err(ProxyError::InvalidRequest(format!(
                "model {model_id} does not support {modality} content (part type {content_type})"
            )));
        }
    }

    Ok(())
}

fn detect_content_types(body: &Value) -> Vec<String> {
    let mut found = Vec::new();
    let Some(messages) = body.get("messages").and_then(|m| m.as_array()) else {
        return found;
    };
    for message in messages {
        let Some(parts) = message.get("content").and_then(|c| c.as_array()) else {
            continue;
        };
        for part in parts {
            if let Some(part_type) = part.get("type").and_then(|t| t.as_str())
                && modality_for_part_type(part_type).is_some()
            {
                found.push(part_type.to_string());
            }
        }
    }
    found
}
