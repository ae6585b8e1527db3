use orp_upstream::ModelInfo;
use serde_json::json;

/// Expose a curated, minimal OpenAI-shaped model list. This avoids
/// overwhelming clients that enumerate all entries.
pub fn translate_models_list(models: &[ModelInfo]) -> serde_json::Value {
    let data: Vec<_> = models
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "object": "model",
                "created": m.created,
                "owned_by": m.id.split('/').next().unwrap_or(""),
                "permission": [],
                "root": m.id,
                "parent": null,
            })
        })
        .collect();
    json!({ "object": "list", "data": data })
}

/// Legacy `/engines` compatibility shape: mirrors `/models` content wrapped
/// as `{"data": [...]}` with engine-era fields.
pub fn translate_engines_list(models: &[ModelInfo]) -> serde_json::Value {
    let data: Vec<_> = models
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "object": "engine",
                "owner": m.id.split('/').next().unwrap_or(""),
                "ready": true,
                "permissions": [],
            })
        })
        .collect();
    json!({ "data": data })
}
