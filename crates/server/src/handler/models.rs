use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use orp_core::error::ProxyError;
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<impl IntoResponse, ProxyError> {
    let mut models = resolve(&state, &query).await;
    if let Some(limit) = query.limit {
        models.truncate(limit);
    }
    Ok(Json(orp_translator::translate_models_list(&models)))
}

async fn resolve(state: &AppState, query: &ModelsQuery) -> Vec<orp_upstream::ModelInfo> {
    if let Some(provider) = query.provider.as_deref() {
        return state.catalog.by_provider(provider).await;
    }
    if let Some(search) = query.search.as_deref() {
        return state.catalog.search(search).await;
    }
    match query.mode.as_deref() {
        Some("curated") => state.catalog.curated(),
        _ => (*state.catalog.all().await).clone(),
    }
}
